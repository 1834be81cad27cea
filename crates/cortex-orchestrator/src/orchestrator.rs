use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use cortex_core::telemetry::{PipelineEvent, Telemetry};
use cortex_core::types::{IntentChain, SessionContext};
use tracing::debug;

use crate::chain_builder::{ai_chain, fallback_chain};
use crate::error::OrchestratorError;
use crate::llm::LanguageModel;
use crate::prompt::{system_prompt, user_prompt};
use crate::schema::parse_reply;

/// Resolves escalated utterances into intent chains through a language
/// model.
///
/// Performs exactly one model call per utterance. There is no retry; any
/// failure degrades to an `unknown` chain in [`Orchestrator::resolve`].
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
    context_turns: usize,
    today: Option<NaiveDate>,
    telemetry: Telemetry,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            system_prompt: system_prompt(),
            context_turns: 3,
            today: None,
            telemetry: Telemetry::default(),
        }
    }

    /// Number of earlier utterances forwarded to the model.
    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    /// Pin the date relative expressions are resolved against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Call the model and validate its reply. Errors are returned as-is.
    pub async fn interpret(
        &self,
        utterance: &str,
        context: &SessionContext,
    ) -> Result<IntentChain, OrchestratorError> {
        let start = Instant::now();
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let prompt = user_prompt(utterance, context, today, self.context_turns);

        debug!(model = %self.model.model_name(), "Calling language model");
        let raw = self.model.complete(&self.system_prompt, &prompt).await?;
        let reply = parse_reply(&raw)?;

        Ok(ai_chain(utterance, reply, elapsed_ms(start)))
    }

    /// Like [`Orchestrator::interpret`], but never fails: transport and
    /// validation errors yield a chain with a single `unknown` action at
    /// confidence 0.
    pub async fn resolve(&self, utterance: &str, context: &SessionContext) -> IntentChain {
        let start = Instant::now();
        match self.interpret(utterance, context).await {
            Ok(chain) => {
                self.telemetry.chain_built(&chain);
                chain
            }
            Err(err) => {
                let chain = fallback_chain(utterance, elapsed_ms(start));
                self.telemetry.emit(PipelineEvent::OrchestrationFailed {
                    chain_id: chain.id,
                    error: err.to_string(),
                });
                chain
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.model_name())
            .field("context_turns", &self.context_turns)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
