//! Session-level driver for the active intent chain.
//!
//! Applies user-driven status changes, then schedules the automatic step
//! (promote the next action, or close the chain) after a short delay so the
//! UI can show each result before moving on.

use std::time::Duration;

use chrono::Utc;
use cortex_core::config::ChainConfig;
use cortex_core::telemetry::{PipelineEvent, Telemetry};
use cortex_core::types::{ActionFailure, ActionStatus, IntentAction, IntentChain};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChainError;
use crate::state_machine::{aggregate_status, apply_transition, next_step, ChainStep};

/// Failure recorded on an action that was still executing at dismissal.
pub const DISMISSED_WHILE_EXECUTING: &str = "Dismissed while executing";

/// Something the driver did on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    /// A pending action now awaits confirmation.
    Promoted(Uuid),
    /// The chain is resolved and no longer active.
    Closed(IntentChain),
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    step: ChainStep,
    due: Instant,
}

/// Owns the single active chain of a session.
#[derive(Debug)]
pub struct ChainDriver {
    chain: Option<IntentChain>,
    scheduled: Option<Scheduled>,
    advance_delay: Duration,
    close_delay: Duration,
    telemetry: Telemetry,
}

impl Default for ChainDriver {
    fn default() -> Self {
        Self::new(&ChainConfig::default())
    }
}

impl ChainDriver {
    pub fn new(config: &ChainConfig) -> Self {
        Self::with_delays(
            Duration::from_millis(config.advance_delay_ms),
            Duration::from_millis(config.close_delay_ms),
        )
    }

    pub fn with_delays(advance_delay: Duration, close_delay: Duration) -> Self {
        Self {
            chain: None,
            scheduled: None,
            advance_delay,
            close_delay,
            telemetry: Telemetry::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn chain(&self) -> Option<&IntentChain> {
        self.chain.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.chain.is_none()
    }

    /// The pending automatic step and when it falls due.
    pub fn scheduled(&self) -> Option<(ChainStep, Instant)> {
        self.scheduled.map(|s| (s.step, s.due))
    }

    /// Make `chain` the active chain, returning the one it replaces.
    pub fn load(&mut self, chain: IntentChain) -> Option<IntentChain> {
        debug!(chain_id = %chain.id, actions = chain.actions.len(), "Loading chain");
        let previous = self.chain.replace(chain);
        self.reschedule();
        previous
    }

    /// Pull a pending action up for confirmation. Refused while another
    /// action is confirming or executing.
    pub fn confirm(&mut self, action_id: Uuid) -> Result<(), ChainError> {
        let chain = self.chain.as_ref().ok_or(ChainError::NoActiveChain)?;
        if let Some(active) = chain.current().filter(|a| a.id != action_id) {
            return Err(ChainError::ActionBusy(active.id));
        }
        self.transition(action_id, ActionStatus::Confirming)
    }

    /// The user accepted; the action is being carried out.
    pub fn start(&mut self, action_id: Uuid) -> Result<(), ChainError> {
        self.transition(action_id, ActionStatus::Executing)
    }

    /// Mark the action done and return it, so follow-up rules can run.
    pub fn succeed(&mut self, action_id: Uuid) -> Result<IntentAction, ChainError> {
        self.transition(action_id, ActionStatus::Success)?;
        self.chain
            .as_ref()
            .and_then(|c| c.action(action_id))
            .cloned()
            .ok_or(ChainError::UnknownAction(action_id))
    }

    pub fn fail(&mut self, action_id: Uuid, failure: ActionFailure) -> Result<(), ChainError> {
        self.transition(action_id, ActionStatus::Failed)?;
        if let Some(action) = self.chain.as_mut().and_then(|c| c.action_mut(action_id)) {
            action.error = Some(failure);
        }
        Ok(())
    }

    pub fn skip(&mut self, action_id: Uuid) -> Result<(), ChainError> {
        self.transition(action_id, ActionStatus::Skipped)
    }

    /// Put a failed action back in line.
    pub fn retry(&mut self, action_id: Uuid) -> Result<(), ChainError> {
        self.transition(action_id, ActionStatus::Pending)
    }

    /// Close the chain now. Pending and confirming actions become skipped.
    /// An executing action becomes a recoverable failure. The returned chain
    /// always has a terminal status.
    pub fn dismiss(&mut self) -> Result<IntentChain, ChainError> {
        let mut chain = self.chain.take().ok_or(ChainError::NoActiveChain)?;
        self.scheduled = None;

        let now = Utc::now();
        for action in chain.actions.iter_mut() {
            let to = match action.status {
                ActionStatus::Pending | ActionStatus::Confirming => ActionStatus::Skipped,
                ActionStatus::Executing => ActionStatus::Failed,
                _ => continue,
            };
            self.telemetry.emit(PipelineEvent::ActionTransition {
                chain_id: chain.id,
                action_id: action.id,
                from: action.status,
                to,
            });
            if to == ActionStatus::Failed {
                action.error = Some(ActionFailure {
                    message: DISMISSED_WHILE_EXECUTING.to_string(),
                    recoverable: true,
                });
            }
            action.status = to;
            action.completed_at = Some(now);
        }
        chain.status = aggregate_status(&chain.actions);

        self.telemetry.emit(PipelineEvent::ChainClosed {
            chain_id: chain.id,
            status: chain.status,
            dismissed: true,
        });
        Ok(chain)
    }

    /// Apply the scheduled step if it is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Option<ChainEvent> {
        let scheduled = self.scheduled?;
        if scheduled.due > now {
            return None;
        }
        self.scheduled = None;

        match scheduled.step {
            ChainStep::Wait => None,
            ChainStep::Promote(action_id) => {
                match self.transition(action_id, ActionStatus::Confirming) {
                    Ok(()) => Some(ChainEvent::Promoted(action_id)),
                    Err(err) => {
                        debug!(%action_id, error = %err, "Scheduled promotion no longer applies");
                        self.reschedule();
                        None
                    }
                }
            }
            ChainStep::Close(_) => {
                let mut chain = self.chain.take()?;
                chain.status = aggregate_status(&chain.actions);
                self.telemetry.emit(PipelineEvent::ChainClosed {
                    chain_id: chain.id,
                    status: chain.status,
                    dismissed: false,
                });
                Some(ChainEvent::Closed(chain))
            }
        }
    }

    /// Wait for the scheduled step and apply it. Returns `None` straight
    /// away when nothing is scheduled.
    pub async fn settle(&mut self) -> Option<ChainEvent> {
        let due = self.scheduled?.due;
        tokio::time::sleep_until(due).await;
        self.tick(Instant::now())
    }

    fn transition(&mut self, action_id: Uuid, to: ActionStatus) -> Result<(), ChainError> {
        let chain = self.chain.as_mut().ok_or(ChainError::NoActiveChain)?;
        let from = apply_transition(chain, action_id, to, Utc::now())?;
        self.telemetry.emit(PipelineEvent::ActionTransition {
            chain_id: chain.id,
            action_id,
            from,
            to,
        });
        self.reschedule();
        Ok(())
    }

    /// Replace whatever was scheduled with the chain's current next step.
    fn reschedule(&mut self) {
        let step = match self.chain.as_ref() {
            Some(chain) => next_step(chain),
            None => ChainStep::Wait,
        };
        let delay = match step {
            ChainStep::Wait => {
                self.scheduled = None;
                return;
            }
            ChainStep::Promote(_) => self.advance_delay,
            ChainStep::Close(_) => self.close_delay,
        };
        self.scheduled = Some(Scheduled {
            step,
            due: Instant::now() + delay,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::types::{ChainMetadata, ChainSource, ChainStatus, Entities, IntentKind};

    fn chain(intents: &[IntentKind]) -> IntentChain {
        let actions = intents
            .iter()
            .map(|i| IntentAction::new(*i, Entities::default(), 0.9))
            .collect();
        IntentChain::new(
            "annuleer en plan opnieuw",
            actions,
            ChainMetadata {
                source: ChainSource::Ai,
                ai_reasoning: None,
                processing_time_ms: 5.0,
                created_at: Utc::now(),
            },
        )
    }

    fn ids(driver: &ChainDriver) -> Vec<Uuid> {
        driver
            .chain()
            .map(|c| c.actions.iter().map(|a| a.id).collect())
            .unwrap_or_default()
    }

    fn later(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn test_defaults_follow_config() {
        let driver = ChainDriver::default();
        assert_eq!(driver.advance_delay, Duration::from_millis(300));
        assert_eq!(driver.close_delay, Duration::from_millis(1500));
        assert!(driver.is_idle());
    }

    #[test]
    fn test_operations_need_a_chain() {
        let mut driver = ChainDriver::default();
        assert!(matches!(
            driver.start(Uuid::new_v4()),
            Err(ChainError::NoActiveChain)
        ));
        assert!(matches!(driver.dismiss(), Err(ChainError::NoActiveChain)));
        assert!(driver.tick(later(10_000)).is_none());
    }

    #[test]
    fn test_success_advances_after_delay() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::CancelAppointment, IntentKind::CreateAppointment]));
        let ids = ids(&driver);
        assert!(driver.scheduled().is_none());

        driver.start(ids[0]).unwrap();
        let done = driver.succeed(ids[0]).unwrap();
        assert_eq!(done.intent, IntentKind::CancelAppointment);
        assert_eq!(done.status, ActionStatus::Success);

        let (step, _) = driver.scheduled().unwrap();
        assert_eq!(step, ChainStep::Promote(ids[1]));
        // Not yet due.
        assert!(driver.tick(Instant::now()).is_none());

        assert_eq!(driver.tick(later(301)), Some(ChainEvent::Promoted(ids[1])));
        let chain = driver.chain().unwrap();
        assert_eq!(chain.actions[1].status, ActionStatus::Confirming);
        assert!(driver.scheduled().is_none());
    }

    #[test]
    fn test_chain_closes_after_close_delay() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note]));
        let id = ids(&driver)[0];

        driver.start(id).unwrap();
        driver.succeed(id).unwrap();
        assert_eq!(
            driver.scheduled().map(|(s, _)| s),
            Some(ChainStep::Close(ChainStatus::Completed))
        );
        assert!(driver.tick(later(1000)).is_none());

        match driver.tick(later(1501)) {
            Some(ChainEvent::Closed(chain)) => assert_eq!(chain.status, ChainStatus::Completed),
            other => panic!("expected close, got {:?}", other),
        }
        assert!(driver.is_idle());
    }

    #[test]
    fn test_partial_chain() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note, IntentKind::Handover, IntentKind::ScheduleView]));
        let ids = ids(&driver);

        driver.start(ids[0]).unwrap();
        driver.succeed(ids[0]).unwrap();
        driver.tick(later(301));
        driver.skip(ids[1]).unwrap();
        driver.tick(later(301));
        driver.start(ids[2]).unwrap();
        driver
            .fail(
                ids[2],
                ActionFailure {
                    message: "agenda niet beschikbaar".to_string(),
                    recoverable: true,
                },
            )
            .unwrap();

        let chain = driver.chain().unwrap();
        assert_eq!(chain.status, ChainStatus::Partial);
        assert_eq!(
            chain.actions[2].error.as_ref().map(|e| e.message.as_str()),
            Some("agenda niet beschikbaar")
        );
        match driver.tick(later(1501)) {
            Some(ChainEvent::Closed(chain)) => assert_eq!(chain.status, ChainStatus::Partial),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_after_failure() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::PatientSearch]));
        let id = ids(&driver)[0];

        driver.start(id).unwrap();
        driver
            .fail(
                id,
                ActionFailure {
                    message: "timeout".to_string(),
                    recoverable: true,
                },
            )
            .unwrap();
        // Retry replaces the scheduled close.
        driver.retry(id).unwrap();
        assert_eq!(driver.scheduled().map(|(s, _)| s), Some(ChainStep::Promote(id)));

        assert_eq!(driver.tick(later(301)), Some(ChainEvent::Promoted(id)));
        driver.start(id).unwrap();
        driver.succeed(id).unwrap();
        assert_eq!(driver.chain().unwrap().status, ChainStatus::Completed);
    }

    #[test]
    fn test_invalid_transition_leaves_chain_untouched() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note]));
        let id = ids(&driver)[0];
        assert!(matches!(
            driver.succeed(id),
            Err(ChainError::InvalidTransition(
                ActionStatus::Confirming,
                ActionStatus::Success
            ))
        ));
        assert_eq!(driver.chain().unwrap().actions[0].status, ActionStatus::Confirming);
    }

    #[test]
    fn test_confirm_refused_while_busy() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note, IntentKind::Handover]));
        let ids = ids(&driver);
        assert!(matches!(
            driver.confirm(ids[1]),
            Err(ChainError::ActionBusy(id)) if id == ids[0]
        ));

        driver.skip(ids[0]).unwrap();
        driver.confirm(ids[1]).unwrap();
        assert_eq!(driver.chain().unwrap().actions[1].status, ActionStatus::Confirming);
        assert!(driver.scheduled().is_none());
    }

    #[test]
    fn test_dismiss_skips_remaining() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note, IntentKind::Handover, IntentKind::ScheduleView]));
        let ids = ids(&driver);
        driver.start(ids[0]).unwrap();
        driver.succeed(ids[0]).unwrap();

        let chain = driver.dismiss().unwrap();
        assert!(driver.is_idle());
        assert!(driver.scheduled().is_none());
        assert_eq!(chain.actions[0].status, ActionStatus::Success);
        assert_eq!(chain.actions[1].status, ActionStatus::Skipped);
        assert_eq!(chain.actions[2].status, ActionStatus::Skipped);
        assert_eq!(chain.status, ChainStatus::Completed);
    }

    #[test]
    fn test_dismiss_while_executing_closes_terminal() {
        let mut driver = ChainDriver::default();
        driver.load(chain(&[IntentKind::Note, IntentKind::Handover]));
        let ids = ids(&driver);
        driver.start(ids[0]).unwrap();

        let chain = driver.dismiss().unwrap();
        assert!(driver.is_idle());
        assert_eq!(chain.actions[0].status, ActionStatus::Failed);
        assert_eq!(
            chain.actions[0].error,
            Some(ActionFailure {
                message: DISMISSED_WHILE_EXECUTING.to_string(),
                recoverable: true,
            })
        );
        assert!(chain.actions[0].completed_at.is_some());
        assert_eq!(chain.actions[1].status, ActionStatus::Skipped);
        assert_eq!(chain.status, ChainStatus::Partial);
        assert!(chain.status.is_terminal());
    }

    #[test]
    fn test_load_replaces_active_chain() {
        let mut driver = ChainDriver::default();
        let first = chain(&[IntentKind::Note]);
        let first_id = first.id;
        assert!(driver.load(first).is_none());
        let replaced = driver.load(chain(&[IntentKind::Handover])).unwrap();
        assert_eq!(replaced.id, first_id);
        assert_ne!(driver.chain().unwrap().id, first_id);
    }

    #[tokio::test]
    async fn test_settle_waits_for_timer() {
        let mut driver =
            ChainDriver::with_delays(Duration::from_millis(5), Duration::from_millis(10));
        driver.load(chain(&[IntentKind::Note, IntentKind::Handover]));
        let ids = ids(&driver);

        assert!(driver.settle().await.is_none());

        driver.skip(ids[0]).unwrap();
        assert_eq!(driver.settle().await, Some(ChainEvent::Promoted(ids[1])));
        driver.skip(ids[1]).unwrap();
        match driver.settle().await {
            Some(ChainEvent::Closed(chain)) => assert_eq!(chain.status, ChainStatus::Completed),
            other => panic!("expected close, got {:?}", other),
        }
    }
}
