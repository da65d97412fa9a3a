//! S3-compatible storage

use crate::object::{BucketConnector, ObjectStoreStorage, retry_config};
use crate::registry::StorageFactory;
use crate::*;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use runvault_core::S3Config;
use std::sync::Arc;
use url::Url;

/// Builds S3 clients from a shared, validated builder template
#[derive(Debug, Clone)]
pub struct S3Connector {
    template: AmazonS3Builder,
}

impl S3Connector {
    /// Start from the `AWS_*` environment and apply configured overrides.
    pub fn from_config(config: &S3Config) -> Result<Self> {
        let init_error = |message: String| StorageError::BackendInit {
            scheme: Scheme::S3,
            message,
        };

        let mut builder = AmazonS3Builder::from_env();

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = &config.endpoint_url {
            Url::parse(endpoint)
                .map_err(|e| init_error(format!("invalid endpoint_url '{}': {}", endpoint, e)))?;
            builder = builder.with_endpoint(endpoint);
        }

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                builder = builder
                    .with_access_key_id(key_id)
                    .with_secret_access_key(secret);
            }
            (None, None) => {}
            _ => {
                return Err(init_error(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
        }

        // Only override the environment when explicitly enabled
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }
        if config.virtual_hosted_style {
            builder = builder.with_virtual_hosted_style_request(true);
        }

        if let Some(max_retries) = config.max_retries {
            builder = builder.with_retry(retry_config(max_retries));
        }

        Ok(Self { template: builder })
    }
}

impl BucketConnector for S3Connector {
    fn connect(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let store = self.template.clone().with_bucket_name(bucket).build()?;
        Ok(Arc::new(store))
    }
}

/// Builds the `s3://` adapter
#[derive(Debug, Clone, Default)]
pub struct S3Factory {
    config: S3Config,
}

impl S3Factory {
    pub fn new(config: S3Config) -> Self {
        Self { config }
    }
}

impl StorageFactory for S3Factory {
    fn scheme(&self) -> Scheme {
        Scheme::S3
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        let connector = S3Connector::from_config(&self.config)?;
        Ok(Arc::new(ObjectStoreStorage::new(Scheme::S3, connector)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_with_static_credentials() {
        let config = S3Config {
            region: Some("us-east-1".to_string()),
            endpoint_url: Some("http://localhost:9000".to_string()),
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio123".to_string()),
            allow_http: true,
            ..Default::default()
        };

        let connector = S3Connector::from_config(&config).unwrap();
        assert!(connector.connect("artifacts").is_ok());
    }

    #[test]
    fn test_half_credentials_fail_init() {
        let config = S3Config {
            access_key_id: Some("minio".to_string()),
            ..Default::default()
        };

        let err = S3Connector::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendInit);
    }

    #[test]
    fn test_invalid_endpoint_fails_init() {
        let config = S3Config {
            endpoint_url: Some("not a url".to_string()),
            ..Default::default()
        };

        let err = S3Factory::new(config).create().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::BackendInit);
    }
}
