//! Protocol nudges.
//!
//! After an action succeeds, an ordered table of declarative care-protocol
//! rules is matched against it. Each matching rule yields a prioritised
//! follow-up suggestion that expires after a fixed time.

pub mod engine;
pub mod queue;
pub mod rule;
pub mod rules;

pub use engine::{CompletedAction, NudgeEngine, DEFAULT_EXPIRY};
pub use queue::{suggested_action, SuggestionQueue};
pub use rule::{
    carry_patient, Condition, ConditionField, Operator, Prefill, ProtocolReference, ProtocolRule,
    RuleTrigger, SuggestionTemplate,
};
pub use rules::default_rules;
