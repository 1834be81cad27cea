//! Reflex layer of the command pipeline.
//!
//! Classifies an utterance against weighted per-intent patterns, extracts
//! literal entities, and decides through explicit triggers and thresholds
//! whether the orchestrator has to take over.

pub mod classifier;
pub mod entities;
pub mod error;
pub mod matcher;
pub mod tables;
pub mod triggers;

pub use classifier::ReflexClassifier;
pub use entities::EntityExtractor;
pub use error::ReflexError;
pub use matcher::{MatchScore, RegexMatcher, ScoredMatcher};
pub use tables::{ReflexTables, TriggerTables};
pub use triggers::EscalationTriggers;
