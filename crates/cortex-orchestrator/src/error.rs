//! Error types for the orchestrator.
//!
//! None of these escape [`crate::Orchestrator::resolve`]; they are logged and
//! turned into an `unknown` chain there.

use cortex_core::error::CortexError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Model returned an empty reply")]
    EmptyReply,
    #[error("Malformed model reply: {0}")]
    Malformed(String),
    #[error("Schema violation: {0}")]
    Schema(String),
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Transport(err.to_string())
    }
}

impl From<OrchestratorError> for CortexError {
    fn from(err: OrchestratorError) -> Self {
        CortexError::Config(err.to_string())
    }
}
