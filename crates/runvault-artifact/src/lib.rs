//! # runvault Artifact Storage
//!
//! This crate provides one storage contract for run artifacts (model files,
//! logs, images) over several backing stores. Every backend answers `list`,
//! `get`, `put` and `delete` with the same path semantics, the same
//! file/directory distinction and the same error taxonomy.
//!
//! ## Features
//!
//! - **Multiple Storage Backends**: local filesystem, S3-compatible, GCS,
//!   Azure Blob and in-memory
//! - **One-level listings**: immediate children only, with pseudo-directories
//!   reported once each
//! - **Root confinement**: relative paths that escape the artifact root are
//!   rejected before any backend call
//! - **Lazy backends**: clients are built on first use and shared for the
//!   process lifetime
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runvault_artifact::{ArtifactRepository, StorageRegistry};
//! use runvault_core::StorageConfig;
//!
//! # async fn example() -> runvault_artifact::Result<()> {
//! let registry = StorageRegistry::from_config(&StorageConfig::default());
//! let repository = ArtifactRepository::new(Arc::new(registry));
//!
//! for object in repository.list("s3://bucket/exp1", "models").await? {
//!     println!("{} {} {}", object.path, object.size, object.is_dir);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod azure;
mod gcs;
mod listing;
mod local;
mod memory;
mod object;
pub mod path;
mod registry;
mod repository;
mod s3;
mod storage;
mod stream;
mod uri;

pub use azure::{AzureConnector, AzureFactory};
pub use gcs::{GcsConnector, GcsFactory};
pub use local::{LocalFactory, LocalStorage};
pub use memory::{InMemoryConnector, InMemoryFactory};
pub use object::{BucketConnector, ObjectStoreStorage};
pub use registry::{StorageFactory, StorageRegistry};
pub use repository::ArtifactRepository;
pub use s3::{S3Connector, S3Factory};
pub use storage::ArtifactStorage;
pub use stream::ArtifactStream;
pub use uri::{ArtifactRoot, Scheme};

/// Boxed cause carried by [`StorageError::Backend`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during artifact operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid artifact root URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid artifact path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("{scheme} storage backend unavailable: {message}")]
    BackendInit { scheme: Scheme, message: String },

    #[error("Backend key '{key}' does not lie under root prefix '{root}'")]
    PathComputation { root: String, key: String },

    #[error("Artifact stream for '{0}' has been closed")]
    StreamClosed(String),
}

/// Coarse classification of a [`StorageError`].
///
/// This is the only thing callers above the adapters branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUri,
    InvalidPath,
    NotFound,
    Backend,
    BackendInit,
}

impl StorageError {
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUri { .. } => ErrorKind::InvalidUri,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BackendInit { .. } => ErrorKind::BackendInit,
            Self::Backend { .. } | Self::PathComputation { .. } | Self::StreamClosed(_) => {
                ErrorKind::Backend
            }
        }
    }
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// One entry of a listing, relative to the artifact root.
///
/// `path` never contains the root prefix and always uses `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactObject {
    pub path: String,
    pub size: i64,
    pub is_dir: bool,
}

impl ArtifactObject {
    pub fn file(path: impl Into<String>, size: i64) -> Self {
        Self {
            path: path.into(),
            size,
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            is_dir: true,
        }
    }
}
