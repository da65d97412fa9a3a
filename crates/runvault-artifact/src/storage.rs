//! Artifact storage trait definition

use crate::*;
use async_trait::async_trait;
use bytes::Bytes;

/// The artifact storage contract, implemented once per backend kind.
///
/// Every operation takes a parsed artifact root and a path relative to it.
/// Paths that climb above the root fail with [`StorageError::InvalidPath`]
/// before the backend is contacted. Backend-native failures are translated
/// into [`StorageError`] by the implementation.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// The scheme this adapter serves
    fn scheme(&self) -> Scheme;

    /// Check that this adapter will serve `root` at all.
    ///
    /// Fails with [`StorageError::InvalidUri`]; every operation applies the
    /// same check before touching the backend.
    fn check_root(&self, root: &ArtifactRoot) -> Result<()> {
        ensure_scheme(self.scheme(), root)
    }

    /// List the immediate children of `path`.
    ///
    /// The queried directory itself is never part of the result, and entries
    /// come back in backend order.
    async fn list(&self, root: &ArtifactRoot, path: &str) -> Result<Vec<ArtifactObject>>;

    /// Open the artifact at `path` for reading.
    async fn get(&self, root: &ArtifactRoot, path: &str) -> Result<ArtifactStream>;

    /// Store `data` at `path`, replacing any existing artifact.
    async fn put(&self, root: &ArtifactRoot, path: &str, data: Bytes) -> Result<()>;

    /// Delete the artifact or directory at `path`. Deleting a non-existing
    /// entry is not an error.
    async fn delete(&self, root: &ArtifactRoot, path: &str) -> Result<()>;
}

/// Reject a root that was parsed for another backend
pub(crate) fn ensure_scheme(storage: Scheme, root: &ArtifactRoot) -> Result<()> {
    if root.scheme == storage {
        Ok(())
    } else {
        Err(StorageError::invalid_uri(
            root.to_string(),
            format!("{} storage cannot serve {} locations", storage, root.scheme),
        ))
    }
}
