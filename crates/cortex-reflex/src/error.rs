//! Error types for the local classifier.

use cortex_core::error::CortexError;

/// Errors raised while building a classifier from its tables.
///
/// Classification itself never fails; these only occur at construction.
#[derive(Debug, thiserror::Error)]
pub enum ReflexError {
    #[error("Invalid pattern '{pattern}' in {table}: {source}")]
    InvalidPattern {
        table: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid weight {weight} for pattern '{pattern}': must be within (0, 1]")]
    InvalidWeight { pattern: String, weight: f64 },
    #[error("Failed to load tables: {0}")]
    Tables(#[from] CortexError),
}

impl From<ReflexError> for CortexError {
    fn from(err: ReflexError) -> Self {
        match err {
            ReflexError::InvalidPattern {
                pattern, source, ..
            } => CortexError::InvalidPattern {
                pattern,
                reason: source.to_string(),
            },
            ReflexError::Tables(inner) => inner,
            other => CortexError::Config(other.to_string()),
        }
    }
}
