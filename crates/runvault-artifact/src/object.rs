//! Object-store backed artifact storage.
//!
//! S3, GCS, Azure and in-memory storage share this adapter; they differ only
//! in the [`BucketConnector`] that builds a client for a bucket.

use crate::listing::{EntrySource, RawEntry, collect_entries};
use crate::storage::ensure_scheme;
use crate::*;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ListResult, ObjectMeta, ObjectStore, PutPayload};
use std::sync::Arc;

/// Builds a client scoped to one bucket (or Azure container).
///
/// Implementations carry the backend's credentials and client options;
/// connecting must not perform network I/O.
#[cfg_attr(test, mockall::automock)]
pub trait BucketConnector: Send + Sync {
    fn connect(&self, bucket: &str) -> object_store::Result<Arc<dyn ObjectStore>>;
}

/// Artifact storage over any [`ObjectStore`].
///
/// Bucket clients are created on first use and kept for the lifetime of the
/// adapter, one per distinct bucket name; bucket names come from registered
/// artifact roots, so the cache is bounded by the run catalog. A failed
/// connect is not cached and is attempted again on the next call.
pub struct ObjectStoreStorage {
    scheme: Scheme,
    connector: Box<dyn BucketConnector>,
    buckets: DashMap<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreStorage {
    pub fn new(scheme: Scheme, connector: impl BucketConnector + 'static) -> Self {
        Self {
            scheme,
            connector: Box::new(connector),
            buckets: DashMap::new(),
        }
    }

    fn bucket(&self, name: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.buckets.get(name) {
            return Ok(store.clone());
        }

        match self.buckets.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                tracing::info!(scheme = %self.scheme, bucket = name, "Connecting bucket client");
                let store = self.connector.connect(name).map_err(|e| {
                    StorageError::backend(
                        format!("failed to create {} client for bucket '{}'", self.scheme, name),
                        e,
                    )
                })?;
                entry.insert(store.clone());
                Ok(store)
            }
        }
    }

    fn object_path(relative: &str, key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key).map_err(|e| StorageError::invalid_path(relative, e.to_string()))
    }

    /// Key of a single object; the bucket root itself is not an object.
    fn object_location(root: &ArtifactRoot, relative: &str) -> Result<ObjectPath> {
        let key = path::join(&root.root_prefix, relative);
        if key.is_empty() {
            return Err(StorageError::invalid_path(relative, "does not name an object"));
        }
        Self::object_path(relative, &key)
    }
}

/// Client retry policy for a configured retry budget
pub(crate) fn retry_config(max_retries: usize) -> object_store::RetryConfig {
    object_store::RetryConfig {
        max_retries,
        ..Default::default()
    }
}

/// Translate an object store failure at the adapter boundary
fn map_object_error(err: object_store::Error, key: &str) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => {
            tracing::warn!(key, error = %other, "Object store request failed");
            StorageError::backend(format!("object store request for '{}' failed", key), other)
        }
    }
}

fn directory_error(relative: String) -> StorageError {
    StorageError::invalid_path(relative, "refers to a directory")
}

/// Whether any key lies below `location`, i.e. it names a pseudo-directory
async fn has_children(store: &dyn ObjectStore, location: &ObjectPath) -> Result<bool> {
    match store.list(Some(location)).next().await {
        Some(Ok(_)) => Ok(true),
        Some(Err(err)) => Err(map_object_error(err, location.as_ref())),
        None => Ok(false),
    }
}

/// A drained delimiter listing: objects first, then common prefixes.
struct DelimitedSource {
    objects: std::vec::IntoIter<ObjectMeta>,
    prefixes: std::vec::IntoIter<ObjectPath>,
}

impl From<ListResult> for DelimitedSource {
    fn from(listing: ListResult) -> Self {
        Self {
            objects: listing.objects.into_iter(),
            prefixes: listing.common_prefixes.into_iter(),
        }
    }
}

#[async_trait]
impl EntrySource for DelimitedSource {
    async fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        if let Some(meta) = self.objects.next() {
            return Ok(Some(RawEntry::object(meta.location.to_string(), meta.size as i64)));
        }
        Ok(self
            .prefixes
            .next()
            .map(|prefix| RawEntry::directory(prefix.to_string())))
    }
}

#[async_trait]
impl ArtifactStorage for ObjectStoreStorage {
    fn scheme(&self) -> Scheme {
        self.scheme
    }

    async fn list(&self, root: &ArtifactRoot, path: &str) -> Result<Vec<ArtifactObject>> {
        let relative = path::normalize_relative(path)?;
        ensure_scheme(self.scheme, root)?;

        let prefix = path::listing_prefix(&root.root_prefix, &relative);
        let prefix = if prefix.is_empty() {
            None
        } else {
            Some(Self::object_path(&relative, &prefix)?)
        };

        let store = self.bucket(&root.bucket)?;
        tracing::debug!(bucket = %root.bucket, prefix = ?prefix, "Listing objects");

        // The client drains every page before returning
        let listing = store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| map_object_error(e, &relative))?;

        let mut source = DelimitedSource::from(listing);
        collect_entries(&mut source, &root.root_prefix, &relative).await
    }

    async fn get(&self, root: &ArtifactRoot, path: &str) -> Result<ArtifactStream> {
        let relative = path::normalize_relative(path)?;
        ensure_scheme(self.scheme, root)?;
        if relative.is_empty() {
            return Err(directory_error(relative));
        }
        let location = Self::object_location(root, &relative)?;

        let store = self.bucket(&root.bucket)?;
        tracing::debug!(bucket = %root.bucket, key = %location, "Opening object");

        let result = match store.get(&location).await {
            // Zero-size objects are directory markers, as in listings
            Ok(result) if result.meta.size == 0 => return Err(directory_error(relative)),
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return if has_children(store.as_ref(), &location).await? {
                    Err(directory_error(relative))
                } else {
                    Err(StorageError::NotFound(relative))
                };
            }
            Err(err) => return Err(map_object_error(err, &relative)),
        };

        let stream_path = relative.clone();
        let stream = result
            .into_stream()
            .map_err(move |e| map_object_error(e, &stream_path));
        Ok(ArtifactStream::new(relative, stream))
    }

    async fn put(&self, root: &ArtifactRoot, path: &str, data: Bytes) -> Result<()> {
        let relative = path::normalize_relative(path)?;
        ensure_scheme(self.scheme, root)?;
        let location = Self::object_location(root, &relative)?;

        let store = self.bucket(&root.bucket)?;
        tracing::debug!(bucket = %root.bucket, key = %location, size = data.len(), "Writing object");

        store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| map_object_error(e, &relative))?;
        Ok(())
    }

    async fn delete(&self, root: &ArtifactRoot, path: &str) -> Result<()> {
        let relative = path::normalize_relative(path)?;
        ensure_scheme(self.scheme, root)?;
        let location = Self::object_location(root, &relative)?;

        let store = self.bucket(&root.bucket)?;

        // Deleting non-existent artifact is not an error
        match store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
            Err(err) => return Err(map_object_error(err, &relative)),
        }

        // Remove everything below the key so pseudo-directories go too
        let nested: Vec<ObjectPath> = store
            .list(Some(&location))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| map_object_error(e, &relative))?;

        tracing::debug!(bucket = %root.bucket, key = %location, nested = nested.len(), "Deleting objects");

        let mut deletions = futures::stream::iter(nested)
            .map(|location| {
                let store = store.clone();
                async move { store.delete(&location).await }
            })
            .buffer_unordered(8);

        while let Some(outcome) = deletions.next().await {
            match outcome {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(err) => return Err(map_object_error(err, &relative)),
            }
        }

        Ok(())
    }
}
