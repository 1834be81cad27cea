//! Orchestrator layer of the command pipeline.
//!
//! Resolves escalated utterances through a language model into validated,
//! ordered intent chains, and turns confident reflex results into local
//! one-action chains. [`CortexPipeline`] ties both layers together.

pub mod chain_builder;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod schema;

pub use chain_builder::{ai_chain, confirmation_message, fallback_chain, local_chain};
pub use error::OrchestratorError;
pub use llm::{HttpLanguageModel, LanguageModel};
pub use orchestrator::Orchestrator;
pub use pipeline::{CortexPipeline, PipelineOutcome};
pub use schema::{parse_reply, ModelReply, ProposedAction};
