//! In-memory object storage
//!
//! This is primarily for testing and demonstration purposes.
//! Data is stored in memory and is not persisted across restarts.

use crate::object::{BucketConnector, ObjectStoreStorage};
use crate::registry::StorageFactory;
use crate::*;
use dashmap::DashMap;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use std::sync::Arc;

/// Hands out one [`InMemory`] store per bucket name.
///
/// Clones share the same buckets, so a test can keep a handle to seed or
/// inspect data while the storage adapter owns another.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    buckets: Arc<DashMap<String, Arc<InMemory>>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store backing `bucket`, created empty on first access
    pub fn bucket(&self, bucket: &str) -> Arc<InMemory> {
        self.buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }

    pub fn storage(&self) -> ObjectStoreStorage {
        ObjectStoreStorage::new(Scheme::Memory, self.clone())
    }
}

impl BucketConnector for InMemoryConnector {
    fn connect(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = self.bucket(bucket);
        Ok(store)
    }
}

/// Builds the `memory://` adapter around a shared connector
#[derive(Clone, Default)]
pub struct InMemoryFactory {
    connector: InMemoryConnector,
}

impl InMemoryFactory {
    pub fn new(connector: InMemoryConnector) -> Self {
        Self { connector }
    }
}

impl StorageFactory for InMemoryFactory {
    fn scheme(&self) -> Scheme {
        Scheme::Memory
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        Ok(Arc::new(self.connector.storage()))
    }
}
