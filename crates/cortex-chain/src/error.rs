//! Error types for chain execution.

use cortex_core::types::ActionStatus;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid action transition: {0} -> {1}")]
    InvalidTransition(ActionStatus, ActionStatus),
    #[error("Action not found in chain: {0}")]
    UnknownAction(Uuid),
    #[error("Another action is in progress: {0}")]
    ActionBusy(Uuid),
    #[error("No active chain")]
    NoActiveChain,
}
