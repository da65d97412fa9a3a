//! Artifact root URI parsing

use crate::{Result, StorageError};
use std::fmt;
use std::str::FromStr;

/// Storage backend selected by an artifact root URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    /// Local filesystem (`file://` or a bare path)
    Local,
    /// S3-compatible object storage (`s3://`)
    S3,
    /// Google Cloud Storage (`gs://`)
    Gcs,
    /// Azure Blob Storage (`az://`, `wasbs://`)
    Azure,
    /// Process-local object storage (`memory://`)
    Memory,
}

impl Scheme {
    pub const ALL: [Scheme; 5] = [
        Scheme::Local,
        Scheme::S3,
        Scheme::Gcs,
        Scheme::Azure,
        Scheme::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Local => "file",
            Scheme::S3 => "s3",
            Scheme::Gcs => "gs",
            Scheme::Azure => "az",
            Scheme::Memory => "memory",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Scheme::Local),
            "s3" | "s3a" => Ok(Scheme::S3),
            "gs" | "gcs" => Ok(Scheme::Gcs),
            "az" | "azure" | "wasb" | "wasbs" => Ok(Scheme::Azure),
            "memory" => Ok(Scheme::Memory),
            other => Err(StorageError::invalid_uri(
                s,
                format!("unsupported scheme '{}'", other),
            )),
        }
    }
}

/// Parsed artifact root location.
///
/// For object stores `bucket` names the bucket (or Azure container) and
/// `root_prefix` the key prefix inside it, without leading or trailing
/// separators. For the local filesystem `bucket` is empty and `root_prefix`
/// is the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRoot {
    pub scheme: Scheme,
    pub bucket: String,
    pub root_prefix: String,
}

impl ArtifactRoot {
    /// Parse an artifact root URI such as `s3://bucket/exp1`,
    /// `wasbs://container@account.blob.core.windows.net/exp1`,
    /// `file:///data/mlruns` or `/data/mlruns`.
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty location"));
        }

        let Some((scheme, rest)) = trimmed.split_once("://") else {
            return Ok(Self::local(trimmed));
        };

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(StorageError::invalid_uri(uri, "malformed scheme"));
        }

        let scheme_kind: Scheme = scheme.parse().map_err(|_| {
            StorageError::invalid_uri(uri, format!("unsupported scheme '{}'", scheme))
        })?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        if scheme_kind == Scheme::Local {
            if !authority.is_empty() && authority != "localhost" {
                return Err(StorageError::invalid_uri(
                    uri,
                    format!("file URIs cannot name a remote host '{}'", authority),
                ));
            }
            if path.is_empty() {
                return Err(StorageError::invalid_uri(uri, "missing directory"));
            }
            return Ok(Self::local(path));
        }

        let bucket = match scheme.to_ascii_lowercase().as_str() {
            // wasbs://container@account.blob.core.windows.net/prefix
            "wasb" | "wasbs" => match authority.split_once('@') {
                Some((container, _account)) => container,
                None => {
                    return Err(StorageError::invalid_uri(
                        uri,
                        "expected container@account in authority",
                    ));
                }
            },
            _ => authority,
        };

        if bucket.is_empty() {
            return Err(StorageError::invalid_uri(uri, "missing bucket"));
        }

        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(StorageError::invalid_uri(
                    uri,
                    "root prefix cannot contain relative segments",
                ));
            }
            segments.push(segment);
        }

        Ok(Self {
            scheme: scheme_kind,
            bucket: bucket.to_string(),
            root_prefix: segments.join("/"),
        })
    }

    fn local(dir: &str) -> Self {
        let trimmed = dir.trim_end_matches('/');
        let root_prefix = if trimmed.is_empty() && dir.starts_with('/') {
            "/"
        } else {
            trimmed
        };

        Self {
            scheme: Scheme::Local,
            bucket: String::new(),
            root_prefix: root_prefix.to_string(),
        }
    }
}

impl fmt::Display for ArtifactRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Local => write!(f, "{}", self.root_prefix),
            scheme if self.root_prefix.is_empty() => write!(f, "{}://{}", scheme, self.bucket),
            scheme => write!(f, "{}://{}/{}", scheme, self.bucket, self.root_prefix),
        }
    }
}
