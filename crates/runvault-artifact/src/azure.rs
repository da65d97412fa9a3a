//! Azure Blob Storage
//!
//! Buckets map to blob containers; the storage account comes from
//! configuration or `AZURE_STORAGE_ACCOUNT_NAME`.

use crate::object::{BucketConnector, ObjectStoreStorage, retry_config};
use crate::registry::StorageFactory;
use crate::*;
use object_store::ObjectStore;
use object_store::azure::MicrosoftAzureBuilder;
use runvault_core::AzureConfig;
use std::env;
use std::sync::Arc;

const ACCOUNT_ENV_VARS: [&str; 2] = ["AZURE_STORAGE_ACCOUNT_NAME", "AZURE_STORAGE_ACCOUNT"];

#[derive(Debug, Clone)]
pub struct AzureConnector {
    template: MicrosoftAzureBuilder,
}

impl AzureConnector {
    pub fn from_config(config: &AzureConfig) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env();

        if config.use_emulator {
            builder = builder.with_use_emulator(true);
        } else {
            let account = config.account.clone().or_else(|| {
                ACCOUNT_ENV_VARS
                    .iter()
                    .find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
            });
            let Some(account) = account else {
                return Err(StorageError::BackendInit {
                    scheme: Scheme::Azure,
                    message: "no storage account configured".to_string(),
                });
            };
            builder = builder.with_account(account);
        }

        if let Some(access_key) = &config.access_key {
            builder = builder.with_access_key(access_key);
        }

        if let Some(max_retries) = config.max_retries {
            builder = builder.with_retry(retry_config(max_retries));
        }

        Ok(Self { template: builder })
    }
}

impl BucketConnector for AzureConnector {
    fn connect(&self, container: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let store = self.template.clone().with_container_name(container).build()?;
        Ok(Arc::new(store))
    }
}

/// Builds the `az://` / `wasbs://` adapter
#[derive(Debug, Clone, Default)]
pub struct AzureFactory {
    config: AzureConfig,
}

impl AzureFactory {
    pub fn new(config: AzureConfig) -> Self {
        Self { config }
    }
}

impl StorageFactory for AzureFactory {
    fn scheme(&self) -> Scheme {
        Scheme::Azure
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        let connector = AzureConnector::from_config(&self.config)?;
        Ok(Arc::new(ObjectStoreStorage::new(Scheme::Azure, connector)))
    }
}
