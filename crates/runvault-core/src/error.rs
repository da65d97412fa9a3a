use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use runvault_core::Error;
    /// let err = Error::config_error("Invalid storage configuration");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Helper for creating run lookup errors
    ///
    /// # Example
    /// ```
    /// use runvault_core::Error;
    /// let err = Error::run_not_found("4f1c");
    /// assert_eq!(err.to_string(), "Run not found: 4f1c");
    /// ```
    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        Error::RunNotFound(run_id.into())
    }
}
