//! HTTP server for runvault

pub mod catalog;
pub mod rest;
pub mod types;

pub use catalog::{InMemoryRunCatalog, RunCatalog};
pub use rest::{AppError, AppState, create_router};
pub use types::*;
