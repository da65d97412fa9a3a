//! Configuration management for runvault
//!
//! Loads configuration with priority:
//! 1. Specified config file
//! 2. runvault.toml in the current directory or a parent
//! 3. Defaults
//!
//! String values of the form `${VAR_NAME}` are resolved from the environment.
//! Storage credentials left unset fall back to the backend SDK environment
//! variables (`AWS_*`, `GOOGLE_*`, `AZURE_*`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for when no explicit config path is given
pub const CONFIG_FILE_NAME: &str = "runvault.toml";

/// runvault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunvaultConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Run ID to artifact root URI, used to seed the run catalog
    #[serde(default)]
    pub runs: BTreeMap<String, String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a single request, including the backend call it makes
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Per-backend storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub gcs: GcsConfig,

    #[serde(default)]
    pub azure: AzureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directories the server may use as local artifact roots; a root must
    /// lie at or below one of them. Relative entries resolve against the
    /// working directory.
    #[serde(default = "default_allowed_roots")]
    pub allowed_roots: Vec<String>,
}

/// S3-compatible storage (AWS, MinIO, Ceph)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub allow_http: bool,

    #[serde(default)]
    pub virtual_hosted_style: bool,

    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcsConfig {
    pub service_account_path: Option<String>,

    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    pub account: Option<String>,

    pub access_key: Option<String>,

    /// Talk to a local Azurite emulator instead of Azure
    #[serde(default)]
    pub use_emulator: bool,

    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    pub service_name: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_roots: default_allowed_roots(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: default_log_filter(),
            service_name: None,
        }
    }
}

impl RunvaultConfig {
    /// Load configuration from runvault.toml if one can be found,
    /// otherwise fall back to defaults.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from: {:?}", path);

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse configuration from TOML text and resolve `${VAR}` references
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: RunvaultConfig = toml::from_str(contents)?;
        config.resolve_env_vars();
        Ok(config)
    }

    /// Find runvault.toml by searching current directory and parents
    fn find_config_file() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    fn resolve_env_vars(&mut self) {
        let s3 = &mut self.storage.s3;
        for value in [
            &mut s3.region,
            &mut s3.endpoint_url,
            &mut s3.access_key_id,
            &mut s3.secret_access_key,
        ] {
            Self::resolve_optional(value);
        }

        Self::resolve_optional(&mut self.storage.gcs.service_account_path);

        let azure = &mut self.storage.azure;
        Self::resolve_optional(&mut azure.account);
        Self::resolve_optional(&mut azure.access_key);

        for uri in self
            .storage
            .local
            .allowed_roots
            .iter_mut()
            .chain(self.runs.values_mut())
        {
            if let Some(resolved) = Self::resolve_env_var(uri) {
                *uri = resolved;
            }
        }
    }

    /// Unresolvable references become `None` so the backend SDK can fall
    /// back to its own environment lookup.
    fn resolve_optional(value: &mut Option<String>) {
        if let Some(current) = value.as_deref() {
            *value = Self::resolve_env_var(current).filter(|v| !v.is_empty());
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_allowed_roots() -> Vec<String> {
    vec!["./mlruns".to_string()]
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunvaultConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert!(config.storage.local.enabled);
        assert_eq!(config.storage.local.allowed_roots, vec!["./mlruns"]);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.runs.is_empty());
    }

    #[test]
    fn test_parse_storage_sections() {
        let config = RunvaultConfig::from_toml(
            r#"
            [server]
            port = 9090

            [storage.local]
            allowed_roots = ["/data/mlruns", "${RUNVAULT_SURELY_UNSET_ROOT}"]

            [storage.s3]
            region = "eu-west-1"
            endpoint_url = "http://localhost:9000"
            allow_http = true
            max_retries = 3

            [storage.azure]
            account = "devstoreaccount1"
            use_emulator = true

            [observability]
            log_format = "json"

            [runs]
            run-1 = "s3://bucket/exp1"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            config.storage.local.allowed_roots,
            vec!["/data/mlruns", "${RUNVAULT_SURELY_UNSET_ROOT}"]
        );
        assert!(config.storage.s3.allow_http);
        assert_eq!(config.storage.s3.max_retries, Some(3));
        assert!(config.storage.azure.use_emulator);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.runs["run-1"], "s3://bucket/exp1");
    }

    #[test]
    fn test_resolve_env_var() {
        unsafe {
            env::set_var("RUNVAULT_TEST_VAR", "test_value");
        }

        let resolved = RunvaultConfig::resolve_env_var("${RUNVAULT_TEST_VAR}");
        assert_eq!(resolved, Some("test_value".to_string()));

        let not_var = RunvaultConfig::resolve_env_var("plain_value");
        assert_eq!(not_var, Some("plain_value".to_string()));

        unsafe {
            env::remove_var("RUNVAULT_TEST_VAR");
        }
    }

    #[test]
    fn test_unresolved_credentials_become_none() {
        let config = RunvaultConfig::from_toml(
            r#"
            [storage.s3]
            access_key_id = "${RUNVAULT_SURELY_UNSET_VAR}"
            region = "us-east-1"
            "#,
        )
        .unwrap();

        assert!(config.storage.s3.access_key_id.is_none());
        assert_eq!(config.storage.s3.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").unwrap();

        let config = RunvaultConfig::load_from(&path).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = RunvaultConfig::load_from(Path::new("/nonexistent/runvault.toml"));
        assert!(result.is_err());
    }
}
