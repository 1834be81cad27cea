//! Action state machine with validated transitions.
//!
//! Per action:
//! Pending -> Confirming -> Executing -> Success/Failed
//! Pending/Confirming -> Skipped
//! Failed -> Pending (retry)

use chrono::{DateTime, Utc};
use cortex_core::types::{ActionStatus, ChainStatus, IntentAction, IntentChain};
use uuid::Uuid;

use crate::error::ChainError;

/// Validate that an action status transition is allowed.
pub fn validate_transition(from: ActionStatus, to: ActionStatus) -> Result<(), ChainError> {
    let valid = matches!(
        (from, to),
        (ActionStatus::Pending, ActionStatus::Confirming)
            | (ActionStatus::Pending, ActionStatus::Skipped)
            | (ActionStatus::Confirming, ActionStatus::Executing)
            | (ActionStatus::Confirming, ActionStatus::Skipped)
            | (ActionStatus::Executing, ActionStatus::Success)
            | (ActionStatus::Executing, ActionStatus::Failed)
            | (ActionStatus::Failed, ActionStatus::Pending)
    );

    if valid {
        Ok(())
    } else {
        Err(ChainError::InvalidTransition(from, to))
    }
}

/// Chain status derived from its actions.
///
/// Executing while any action is unresolved. Once all are terminal:
/// completed when nothing failed, failed when nothing succeeded or was
/// skipped, partial otherwise. An empty chain is completed.
pub fn aggregate_status(actions: &[IntentAction]) -> ChainStatus {
    if actions.iter().any(|a| !a.status.is_terminal()) {
        return ChainStatus::Executing;
    }
    let failed = actions
        .iter()
        .filter(|a| a.status == ActionStatus::Failed)
        .count();
    match failed {
        0 => ChainStatus::Completed,
        n if n == actions.len() => ChainStatus::Failed,
        _ => ChainStatus::Partial,
    }
}

/// What the chain should do next on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// An action is awaiting the user or still running.
    Wait,
    /// Bring this pending action up for confirmation.
    Promote(Uuid),
    /// Every action is resolved; close with this status.
    Close(ChainStatus),
}

/// Decide the next automatic step. Pure.
pub fn next_step(chain: &IntentChain) -> ChainStep {
    if chain.actions.iter().any(|a| a.status.is_active()) {
        return ChainStep::Wait;
    }
    // With nothing active, every non-pending action is terminal, so the
    // first pending one is next in line.
    if let Some(pending) = chain
        .actions
        .iter()
        .find(|a| a.status == ActionStatus::Pending)
    {
        return ChainStep::Promote(pending.id);
    }
    ChainStep::Close(aggregate_status(&chain.actions))
}

/// Move one action to `to`, keeping the chain status in sync.
///
/// Returns the status the action had before. Success, failure and skip stamp
/// `completed_at`; a retry clears the failure and the stamp.
pub fn apply_transition(
    chain: &mut IntentChain,
    action_id: Uuid,
    to: ActionStatus,
    now: DateTime<Utc>,
) -> Result<ActionStatus, ChainError> {
    let action = chain
        .action_mut(action_id)
        .ok_or(ChainError::UnknownAction(action_id))?;
    let from = action.status;
    validate_transition(from, to)?;

    action.status = to;
    if to.is_terminal() {
        action.completed_at = Some(now);
    }
    if from == ActionStatus::Failed && to == ActionStatus::Pending {
        action.error = None;
        action.completed_at = None;
    }

    chain.status = aggregate_status(&chain.actions);
    Ok(from)
}
