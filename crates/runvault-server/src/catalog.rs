//! Run metadata lookup
//!
//! The artifact endpoints address artifacts by run id; a [`RunCatalog`]
//! maps the id to the run's artifact root URI.

use async_trait::async_trait;
use dashmap::DashMap;
use runvault_core::{Error, Result};
use uuid::Uuid;

#[async_trait]
pub trait RunCatalog: Send + Sync {
    /// Artifact root URI of `run_id`, or [`Error::RunNotFound`].
    async fn artifact_uri(&self, run_id: &str) -> Result<String>;

    /// Record a run, generating an id when none is given. Returns the id.
    async fn register(&self, run_id: Option<String>, artifact_uri: String) -> Result<String>;
}

/// In-memory run catalog
#[derive(Debug, Default)]
pub struct InMemoryRunCatalog {
    runs: DashMap<String, String>,
}

impl InMemoryRunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with `(run_id, artifact_uri)` pairs
    pub fn with_runs(runs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            runs: runs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunCatalog for InMemoryRunCatalog {
    async fn artifact_uri(&self, run_id: &str) -> Result<String> {
        self.runs
            .get(run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::run_not_found(run_id))
    }

    async fn register(&self, run_id: Option<String>, artifact_uri: String) -> Result<String> {
        let run_id = match run_id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::config_error("run id cannot be blank"));
            }
            Some(id) => id,
            None => Uuid::new_v4().simple().to_string(),
        };

        if let Some(previous) = self.runs.insert(run_id.clone(), artifact_uri.clone()) {
            tracing::info!(%run_id, %previous, %artifact_uri, "Replaced artifact root of run");
        } else {
            tracing::debug!(%run_id, %artifact_uri, "Registered run");
        }

        Ok(run_id)
    }
}
