//! # runvault Telemetry
//!
//! Logging and tracing setup for runvault processes, plus span helpers for
//! artifact storage calls.
//!
//! Spans carry structured attributes (operation, scheme, bucket, path) so
//! storage calls can be followed through an OpenTelemetry pipeline as well
//! as in plain logs.

mod spans;
mod tracer;

pub use spans::{StorageSpanAttributes, record_outcome, storage_span};
pub use tracer::{init_telemetry, register_span_processor, tracer_provider};

/// Span attribute names for artifact storage calls.
pub mod attributes {
    pub const STORAGE_OPERATION: &str = "storage.operation";
    pub const STORAGE_SCHEME: &str = "storage.scheme";
    pub const STORAGE_BUCKET: &str = "storage.bucket";
    pub const STORAGE_ROOT_PREFIX: &str = "storage.root_prefix";
    pub const STORAGE_PATH: &str = "storage.path";
    pub const STORAGE_OUTCOME: &str = "storage.outcome";

    /// Instrumentation scope name
    pub const SYSTEM_NAME: &str = "runvault";
}
