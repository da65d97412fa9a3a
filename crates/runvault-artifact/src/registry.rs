//! Storage backend registry
//!
//! Maps a [`Scheme`] to the adapter serving it. Adapters are constructed
//! lazily, at most once per scheme, and shared for the registry's lifetime.

use crate::*;
use once_cell::sync::OnceCell;
use runvault_core::StorageConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating storage adapters
///
/// Each backend implements this trait to enable creation from config
pub trait StorageFactory: Send + Sync {
    /// Scheme served by the adapters this factory builds
    fn scheme(&self) -> Scheme;

    /// Build the adapter and its backend client.
    ///
    /// Failures should be [`StorageError::BackendInit`]; they are remembered
    /// and returned on every later resolve.
    fn create(&self) -> Result<Arc<dyn ArtifactStorage>>;
}

/// Hands out a pre-built adapter
struct InstanceFactory(Arc<dyn ArtifactStorage>);

impl StorageFactory for InstanceFactory {
    fn scheme(&self) -> Scheme {
        self.0.scheme()
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        Ok(self.0.clone())
    }
}

struct Slot {
    factory: Box<dyn StorageFactory>,
    adapter: OnceCell<std::result::Result<Arc<dyn ArtifactStorage>, String>>,
}

/// Registry of storage adapters, keyed by scheme.
///
/// Construct it once at startup and share it behind an `Arc`; tests build
/// their own with fake backends.
#[derive(Default)]
pub struct StorageRegistry {
    slots: HashMap<Scheme, Slot>,
}

impl StorageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend, configured from `config`.
    ///
    /// Nothing is connected here; each backend is built on first resolve.
    pub fn from_config(config: &StorageConfig) -> Self {
        let mut registry = Self::new();

        if config.local.enabled {
            registry.register(LocalFactory::from_config(&config.local));
        }
        registry.register(S3Factory::new(config.s3.clone()));
        registry.register(GcsFactory::new(config.gcs.clone()));
        registry.register(AzureFactory::new(config.azure.clone()));
        registry.register(InMemoryFactory::default());

        registry
    }

    /// Register a factory, replacing any previous one for the same scheme
    pub fn register(&mut self, factory: impl StorageFactory + 'static) {
        let scheme = factory.scheme();
        self.slots.insert(
            scheme,
            Slot {
                factory: Box::new(factory),
                adapter: OnceCell::new(),
            },
        );
    }

    /// Register an already constructed adapter under its own scheme
    pub fn register_storage(&mut self, storage: Arc<dyn ArtifactStorage>) {
        self.register(InstanceFactory(storage));
    }

    /// Resolve the adapter serving `scheme`, constructing it on first use.
    ///
    /// Concurrent callers for the same scheme wait for a single construction.
    pub fn resolve(&self, scheme: Scheme) -> Result<Arc<dyn ArtifactStorage>> {
        let slot = self
            .slots
            .get(&scheme)
            .ok_or_else(|| StorageError::BackendInit {
                scheme,
                message: "no storage backend registered for this scheme".to_string(),
            })?;

        let adapter = slot.adapter.get_or_init(|| {
            tracing::info!(%scheme, "Initializing storage backend");
            slot.factory.create().map_err(|err| {
                tracing::error!(%scheme, error = %err, "Storage backend initialization failed");
                match err {
                    StorageError::BackendInit { message, .. } => message,
                    other => other.to_string(),
                }
            })
        });

        adapter
            .as_ref()
            .map(Arc::clone)
            .map_err(|message| StorageError::BackendInit {
                scheme,
                message: message.clone(),
            })
    }

    /// Schemes with a registered factory
    pub fn schemes(&self) -> Vec<Scheme> {
        let mut schemes: Vec<_> = self.slots.keys().copied().collect();
        schemes.sort();
        schemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFactory {
        scheme: Scheme,
        created: Arc<AtomicUsize>,
        fail: bool,
    }

    impl StorageFactory for CountingFactory {
        fn scheme(&self) -> Scheme {
            self.scheme
        }

        fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            // Widen the window for racing resolvers
            std::thread::sleep(Duration::from_millis(20));
            if self.fail {
                return Err(StorageError::BackendInit {
                    scheme: self.scheme,
                    message: "missing credentials".to_string(),
                });
            }
            Ok(Arc::new(InMemoryConnector::new().storage()))
        }
    }

    #[test]
    fn test_concurrent_resolve_constructs_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let mut registry = StorageRegistry::new();
        registry.register(CountingFactory {
            scheme: Scheme::Memory,
            created: created.clone(),
            fail: false,
        });

        let adapters: Vec<Arc<dyn ArtifactStorage>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| registry.resolve(Scheme::Memory).ok().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(adapters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_backend_stays_failed() {
        let created = Arc::new(AtomicUsize::new(0));
        let mut registry = StorageRegistry::new();
        registry.register(CountingFactory {
            scheme: Scheme::S3,
            created: created.clone(),
            fail: true,
        });

        for _ in 0..3 {
            let err = registry.resolve(Scheme::S3).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::BackendInit);
            assert!(err.to_string().contains("missing credentials"));
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_scheme() {
        let registry = StorageRegistry::new();
        let err = registry.resolve(Scheme::Gcs).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::BackendInit);
    }

    #[test]
    fn test_from_config_registers_builtin_backends() {
        let registry = StorageRegistry::from_config(&StorageConfig::default());
        assert_eq!(registry.schemes(), Scheme::ALL.to_vec());

        let local = registry.resolve(Scheme::Local).ok().unwrap();
        assert_eq!(local.scheme(), Scheme::Local);
    }

    #[test]
    fn test_local_can_be_disabled() {
        let mut config = StorageConfig::default();
        config.local.enabled = false;

        let registry = StorageRegistry::from_config(&config);
        assert!(registry.resolve(Scheme::Local).is_err());
    }

    #[test]
    fn test_register_storage_instance() {
        let mut registry = StorageRegistry::new();
        let storage: Arc<dyn ArtifactStorage> = Arc::new(LocalStorage::new());
        registry.register_storage(storage.clone());

        let resolved = registry.resolve(Scheme::Local).ok().unwrap();
        assert!(Arc::ptr_eq(&resolved, &storage));
    }
}
