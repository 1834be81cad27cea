//! Action-chain state machine.
//!
//! Validates per-action transitions, derives the chain status from its
//! actions, and drives the active chain of a session through confirmation,
//! execution, auto-advance and close.

pub mod driver;
pub mod error;
pub mod state_machine;

pub use driver::{ChainDriver, ChainEvent, DISMISSED_WHILE_EXECUTING};
pub use error::ChainError;
pub use state_machine::{aggregate_status, apply_transition, next_step, validate_transition, ChainStep};
