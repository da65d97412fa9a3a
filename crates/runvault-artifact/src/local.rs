//! Local filesystem artifact storage

use crate::listing::{EntrySource, RawEntry, collect_entries};
use crate::registry::StorageFactory;
use crate::storage::ensure_scheme;
use crate::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use runvault_core::LocalConfig;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::io::ReaderStream;

/// File system artifact storage.
///
/// The artifact root is a directory; listings come from directory
/// enumeration, so real directories are reported as `is_dir` regardless of
/// their contents.
///
/// A confined storage only serves roots at or below its allowed base
/// directories. Roots are compared lexically after resolving `.` and `..`;
/// symlinks are not followed.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    /// `None` serves any directory the process can reach
    allowed_roots: Option<Vec<PathBuf>>,
}

impl LocalStorage {
    /// Storage serving any directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage serving only roots at or below one of `roots`
    pub fn confined<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let allowed_roots = roots
            .into_iter()
            .filter_map(|root| match lexical_absolute(root.as_ref()) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::warn!(root = ?root.as_ref(), error = %err, "Ignoring allowed local root");
                    None
                }
            })
            .collect();

        Self {
            allowed_roots: Some(allowed_roots),
        }
    }

    fn resolve(root: &ArtifactRoot, relative: &str) -> PathBuf {
        let mut path = PathBuf::from(&root.root_prefix);
        if !relative.is_empty() {
            path.push(relative);
        }
        path
    }
}

/// Absolute form of `path` with `.` and `..` resolved without touching the
/// filesystem
fn lexical_absolute(path: &Path) -> std::io::Result<PathBuf> {
    let mut resolved = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir()?
    };

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}

fn map_io_error(err: std::io::Error, relative: &str) -> StorageError {
    if err.kind() == IoErrorKind::NotFound {
        StorageError::NotFound(relative.to_string())
    } else {
        StorageError::backend(format!("filesystem access to '{}' failed", relative), err)
    }
}

/// Directory enumeration as an [`EntrySource`]
struct DirectorySource {
    entries: fs::ReadDir,
    root_prefix: String,
    relative: String,
}

#[async_trait]
impl EntrySource for DirectorySource {
    async fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        let Some(entry) = self
            .entries
            .next_entry()
            .await
            .map_err(|e| map_io_error(e, &self.relative))?
        else {
            return Ok(None);
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let key = path::join(&self.root_prefix, &path::join(&self.relative, &name));

        // Follow symlinks so a linked directory lists as a directory
        let metadata = fs::metadata(entry.path())
            .await
            .map_err(|e| map_io_error(e, &self.relative))?;

        if metadata.is_dir() {
            Ok(Some(RawEntry::directory(key)))
        } else {
            Ok(Some(RawEntry {
                key,
                size: metadata.len() as i64,
                is_dir: false,
            }))
        }
    }
}

#[async_trait]
impl ArtifactStorage for LocalStorage {
    fn scheme(&self) -> Scheme {
        Scheme::Local
    }

    fn check_root(&self, root: &ArtifactRoot) -> Result<()> {
        ensure_scheme(Scheme::Local, root)?;

        let Some(allowed_roots) = &self.allowed_roots else {
            return Ok(());
        };

        let dir = lexical_absolute(Path::new(&root.root_prefix))
            .map_err(|e| StorageError::invalid_uri(root.to_string(), e.to_string()))?;
        if allowed_roots.iter().any(|base| dir.starts_with(base)) {
            Ok(())
        } else {
            Err(StorageError::invalid_uri(
                root.to_string(),
                "outside the allowed local artifact roots",
            ))
        }
    }

    async fn list(&self, root: &ArtifactRoot, path: &str) -> Result<Vec<ArtifactObject>> {
        let relative = path::normalize_relative(path)?;
        self.check_root(root)?;

        let dir = Self::resolve(root, &relative);
        tracing::debug!(dir = ?dir, "Listing local directory");

        let entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                let parent_exists = match dir.parent() {
                    Some(parent) => fs::try_exists(parent).await.unwrap_or(false),
                    None => false,
                };
                return if parent_exists {
                    Ok(Vec::new())
                } else {
                    Err(StorageError::NotFound(relative))
                };
            }
            // Listing a file yields nothing, as it does on object stores
            Err(err) if err.kind() == IoErrorKind::NotADirectory => return Ok(Vec::new()),
            Err(err) => return Err(map_io_error(err, &relative)),
        };

        let mut source = DirectorySource {
            entries,
            root_prefix: root.root_prefix.clone(),
            relative: relative.clone(),
        };
        collect_entries(&mut source, &root.root_prefix, &relative).await
    }

    async fn get(&self, root: &ArtifactRoot, path: &str) -> Result<ArtifactStream> {
        let relative = path::normalize_relative(path)?;
        self.check_root(root)?;

        let file_path = Self::resolve(root, &relative);
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|e| map_io_error(e, &relative))?;
        if metadata.is_dir() {
            return Err(StorageError::invalid_path(relative, "refers to a directory"));
        }

        let file = fs::File::open(&file_path)
            .await
            .map_err(|e| map_io_error(e, &relative))?;

        let stream_path = relative.clone();
        let stream = ReaderStream::new(file).map_err(move |e| map_io_error(e, &stream_path));
        Ok(ArtifactStream::new(relative, stream))
    }

    async fn put(&self, root: &ArtifactRoot, path: &str, data: Bytes) -> Result<()> {
        let relative = path::normalize_relative(path)?;
        self.check_root(root)?;
        if relative.is_empty() {
            return Err(StorageError::invalid_path(path, "cannot write to the artifact root"));
        }

        let file_path = Self::resolve(root, &relative);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(e, &relative))?;
        }

        fs::write(&file_path, &data)
            .await
            .map_err(|e| map_io_error(e, &relative))
    }

    async fn delete(&self, root: &ArtifactRoot, path: &str) -> Result<()> {
        let relative = path::normalize_relative(path)?;
        self.check_root(root)?;
        if relative.is_empty() {
            return Err(StorageError::invalid_path(path, "cannot delete the artifact root"));
        }

        let target = Self::resolve(root, &relative);
        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            // Deleting non-existent artifact is not an error
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(map_io_error(err, &relative)),
        };

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&target).await
        } else {
            fs::remove_file(&target).await
        };

        match removed {
            Err(err) if err.kind() != IoErrorKind::NotFound => Err(map_io_error(err, &relative)),
            _ => Ok(()),
        }
    }
}

/// Builds [`LocalStorage`]; the default factory serves any directory.
#[derive(Debug, Clone, Default)]
pub struct LocalFactory {
    storage: LocalStorage,
}

impl LocalFactory {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Factory confined to the configured `allowed_roots`
    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(LocalStorage::confined(&config.allowed_roots))
    }
}

impl StorageFactory for LocalFactory {
    fn scheme(&self) -> Scheme {
        Scheme::Local
    }

    fn create(&self) -> Result<Arc<dyn ArtifactStorage>> {
        Ok(Arc::new(self.storage.clone()))
    }
}
