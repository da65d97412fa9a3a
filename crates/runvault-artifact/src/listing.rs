//! One-level listing assembly.
//!
//! Each adapter exposes its backend's enumeration as an [`EntrySource`] and
//! hands it to [`collect_entries`], which drains it and turns raw backend keys
//! into [`ArtifactObject`]s.

use crate::{ArtifactObject, Result, path};
use async_trait::async_trait;
use std::collections::HashMap;

/// A backend entry before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawEntry {
    /// Full backend key or path, root prefix included
    pub key: String,
    pub size: i64,
    pub is_dir: bool,
}

impl RawEntry {
    /// An object-store object; zero-size objects are directory markers.
    pub fn object(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size,
            is_dir: size == 0,
        }
    }

    /// A common prefix or a real directory
    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            is_dir: true,
        }
    }
}

/// Produce the next entry of a listing, or `None` once exhausted.
#[async_trait]
pub(crate) trait EntrySource: Send {
    async fn next_entry(&mut self) -> Result<Option<RawEntry>>;
}

/// Drain `source` and build the listing of `relative` under `root_prefix`.
///
/// The queried directory itself is dropped, and a marker object and a common
/// prefix naming the same directory collapse into one entry. Backend order is
/// kept. Any error aborts the whole listing.
pub(crate) async fn collect_entries<S>(
    source: &mut S,
    root_prefix: &str,
    relative: &str,
) -> Result<Vec<ArtifactObject>>
where
    S: EntrySource + ?Sized,
{
    let queried = path::trim_trailing(relative);
    let mut objects: Vec<ArtifactObject> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    while let Some(entry) = source.next_entry().await? {
        let rel_path = path::relative_path(root_prefix, &entry.key)?;
        if rel_path == queried {
            continue;
        }

        if let Some(&index) = seen.get(&rel_path) {
            objects[index].is_dir |= entry.is_dir;
            continue;
        }

        seen.insert(rel_path.clone(), objects.len());
        objects.push(ArtifactObject {
            path: rel_path,
            size: entry.size,
            is_dir: entry.is_dir,
        });
    }

    Ok(objects)
}
