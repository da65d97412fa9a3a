//! Core types shared across runvault crates
//!
//! Holds process configuration and the top-level error type.

pub mod config;
pub mod error;

pub use config::{
    AzureConfig, GcsConfig, LocalConfig, LogFormat, ObservabilityConfig, RunvaultConfig,
    S3Config, ServerConfig, StorageConfig,
};
pub use error::{Error, Result};
