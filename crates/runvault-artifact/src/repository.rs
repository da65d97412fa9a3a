//! Artifact access by root URI
//!
//! [`ArtifactRepository`] is what request handlers and the CLI talk to: it
//! parses the root URI, picks the adapter from the registry and wraps the
//! call in a storage span.

use crate::*;
use bytes::Bytes;
use runvault_telemetry::{StorageSpanAttributes, record_outcome, storage_span};
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Scheme-agnostic artifact access
#[derive(Clone)]
pub struct ArtifactRepository {
    registry: Arc<StorageRegistry>,
}

impl ArtifactRepository {
    pub fn new(registry: Arc<StorageRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StorageRegistry> {
        &self.registry
    }

    /// Parse `root_uri` and check that its backend will serve it.
    ///
    /// Nothing is read or written; a root outside the allowed local
    /// directories fails with [`StorageError::InvalidUri`].
    pub fn check_root(&self, root_uri: &str) -> Result<ArtifactRoot> {
        let root = ArtifactRoot::parse(root_uri)?;
        self.registry.resolve(root.scheme)?.check_root(&root)?;
        Ok(root)
    }

    /// List the immediate children of `path` under the root `root_uri`.
    pub async fn list(&self, root_uri: &str, path: &str) -> Result<Vec<ArtifactObject>> {
        self.run("list", root_uri, path, |storage, root| async move {
            storage.list(&root, path).await
        })
        .await
    }

    /// Open the file at `path` under the root `root_uri` for streaming.
    pub async fn get(&self, root_uri: &str, path: &str) -> Result<ArtifactStream> {
        self.run("get", root_uri, path, |storage, root| async move {
            storage.get(&root, path).await
        })
        .await
    }

    pub async fn put(&self, root_uri: &str, path: &str, data: Bytes) -> Result<()> {
        self.run("put", root_uri, path, |storage, root| async move {
            storage.put(&root, path, data).await
        })
        .await
    }

    pub async fn delete(&self, root_uri: &str, path: &str) -> Result<()> {
        self.run("delete", root_uri, path, |storage, root| async move {
            storage.delete(&root, path).await
        })
        .await
    }

    async fn run<'a, T, F, Fut>(
        &self,
        operation: &'static str,
        root_uri: &str,
        path: &'a str,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<dyn ArtifactStorage>, ArtifactRoot) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let root = ArtifactRoot::parse(root_uri)?;

        let span = storage_span(&StorageSpanAttributes {
            operation,
            scheme: root.scheme.to_string(),
            bucket: root.bucket.clone(),
            root_prefix: root.root_prefix.clone(),
            path: path.to_string(),
        });

        let registry = &self.registry;
        let result = async move {
            let storage = registry.resolve(root.scheme)?;
            call(storage, root).await
        }
        .instrument(span.clone())
        .await;

        record_outcome(&span, &result);
        if let Err(err) = &result {
            tracing::debug!(parent: &span, error = %err, kind = ?err.kind(), "Storage call failed");
        }
        result
    }
}

impl std::fmt::Debug for ArtifactRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRepository")
            .field("schemes", &self.registry.schemes())
            .finish()
    }
}
