//! Google Cloud Storage

use crate::object::{BucketConnector, ObjectStoreStorage, retry_config};
use crate::registry::StorageFactory;
use crate::*;
use object_store::ObjectStore;
use object_store::gcp::GoogleCloudStorageBuilder;
use runvault_core::GcsConfig;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GcsConnector {
    template: GoogleCloudStorageBuilder,
}

impl GcsConnector {
    /// Start from the `GOOGLE_*` environment and apply configured overrides.
    pub fn from_config(config: &GcsConfig) -> Result<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env();

        if let Some(service_account) = &config.service_account_path {
            if !Path::new(service_account).is_file() {
                return Err(StorageError::BackendInit {
                    scheme: Scheme::Gcs,
                    message: format!("service account file '{}' does not exist", service_account),
                });
            }
            builder = builder.with_service_account_path(service_account);
        }

        if let Some(max_retries) = config.max_retries {
            builder = builder.with_retry(retry_config(max_retries));
        }

        Ok(Self { template: builder })
    }
}

impl BucketConnector for GcsConnector {
    fn connect(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let store = self.template.clone().with_bucket_name(bucket).build()?;
        Ok(Arc::new(store))
    }
}

/// Builds the `gs://` adapter
#[derive(Debug, Clone, Default)]
pub struct GcsFactory {
    config: GcsConfig,
}

impl GcsFactory {
    pub fn new(config: GcsConfig) -> Self {
        Self { config }
    }
}

impl StorageFactory for GcsFactory {
    fn scheme(&self) -> Scheme {
        Scheme::Gcs
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        let connector = GcsConnector::from_config(&self.config)?;
        Ok(Arc::new(ObjectStoreStorage::new(Scheme::Gcs, connector)))
    }
}
