use thiserror::Error;

/// Top-level error type for the Cortex workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for CortexError` where they need to cross crate
/// boundaries with `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CortexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl From<toml::de::Error> for CortexError {
    fn from(err: toml::de::Error) -> Self {
        CortexError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CortexError {
    fn from(err: toml::ser::Error) -> Self {
        CortexError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CortexError {
    fn from(err: serde_json::Error) -> Self {
        CortexError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Cortex operations.
pub type Result<T> = std::result::Result<T, CortexError>;
