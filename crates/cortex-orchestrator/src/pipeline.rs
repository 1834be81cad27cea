use std::sync::Arc;

use cortex_core::config::CortexConfig;
use cortex_core::telemetry::Telemetry;
use cortex_core::types::{IntentChain, LocalClassificationResult, SessionContext};
use cortex_reflex::ReflexClassifier;
use serde::Serialize;

use crate::chain_builder::local_chain;
use crate::llm::{HttpLanguageModel, LanguageModel};
use crate::orchestrator::Orchestrator;

/// Result of running one utterance through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// What the reflex layer made of the utterance, escalated or not.
    pub classification: LocalClassificationResult,
    pub chain: IntentChain,
}

impl PipelineOutcome {
    pub fn escalated(&self) -> bool {
        self.classification.should_escalate_to_ai
    }
}

/// Reflex layer in front of the orchestrator.
///
/// Shared by reference; concurrent calls to [`CortexPipeline::process`]
/// do not interact.
pub struct CortexPipeline {
    reflex: ReflexClassifier,
    orchestrator: Orchestrator,
    telemetry: Telemetry,
}

impl CortexPipeline {
    pub fn new(reflex: ReflexClassifier, orchestrator: Orchestrator) -> Self {
        Self {
            reflex,
            orchestrator,
            telemetry: Telemetry::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.orchestrator = self.orchestrator.with_telemetry(telemetry.clone());
        self.telemetry = telemetry;
        self
    }

    /// Build the pipeline from configuration with the HTTP model client.
    pub fn from_config(config: &CortexConfig) -> cortex_core::Result<Self> {
        let model: Arc<dyn LanguageModel> =
            Arc::new(HttpLanguageModel::from_config(&config.orchestrator)?);
        Self::from_config_with_model(config, model)
    }

    /// Like [`CortexPipeline::from_config`] but with a caller-supplied
    /// model.
    pub fn from_config_with_model(
        config: &CortexConfig,
        model: Arc<dyn LanguageModel>,
    ) -> cortex_core::Result<Self> {
        let reflex = ReflexClassifier::from_config(&config.reflex)?;
        let orchestrator =
            Orchestrator::new(model).with_context_turns(config.orchestrator.context_turns);
        Ok(Self::new(reflex, orchestrator).with_telemetry(Telemetry::new(config.telemetry.clone())))
    }

    pub fn reflex(&self) -> &ReflexClassifier {
        &self.reflex
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run only the reflex layer.
    pub fn classify(&self, utterance: &str) -> LocalClassificationResult {
        let result = self.reflex.classify(utterance);
        self.telemetry.classified(utterance, &result);
        result
    }

    /// Classify and, when the reflex layer escalates, resolve through the
    /// orchestrator. Never fails.
    pub async fn process(&self, utterance: &str, context: &SessionContext) -> PipelineOutcome {
        let classification = self.classify(utterance);

        let chain = match classification.escalation_reason {
            None => {
                let chain = local_chain(utterance.trim(), &classification);
                self.telemetry.chain_built(&chain);
                chain
            }
            Some(reason) => {
                self.telemetry
                    .escalated(utterance, reason, &classification.entities);
                self.orchestrator.resolve(utterance.trim(), context).await
            }
        };

        PipelineOutcome {
            classification,
            chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use async_trait::async_trait;
    use cortex_core::types::{ChainSource, EscalationReason, IntentKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and always fails.
    #[derive(Default)]
    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        async fn complete(&self, _s: &str, _u: &str) -> Result<String, OrchestratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OrchestratorError::EmptyReply)
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn pipeline(model: Arc<CountingModel>) -> CortexPipeline {
        CortexPipeline::from_config_with_model(&CortexConfig::default(), model).unwrap()
    }

    #[tokio::test]
    async fn test_confident_input_stays_local() {
        let model = Arc::new(CountingModel::default());
        let pipeline = pipeline(model.clone());
        let outcome = pipeline
            .process("  start de overdracht ", &SessionContext::default())
            .await;

        assert!(!outcome.escalated());
        assert_eq!(outcome.chain.metadata.source, ChainSource::Local);
        assert_eq!(outcome.chain.raw_input, "start de overdracht");
        assert_eq!(outcome.chain.actions[0].intent, IntentKind::Handover);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_escalated_input_calls_model_once() {
        let model = Arc::new(CountingModel::default());
        let pipeline = pipeline(model.clone());
        let outcome = pipeline
            .process("plan een afspraak morgen", &SessionContext::default())
            .await;

        assert_eq!(
            outcome.classification.escalation_reason,
            Some(EscalationReason::RelativeTime)
        );
        assert_eq!(outcome.chain.metadata.source, ChainSource::Ai);
        assert_eq!(outcome.chain.actions[0].intent, IntentKind::Unknown);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_rejects_missing_tables() {
        let mut config = CortexConfig::default();
        config.reflex.tables_path = Some("/nonexistent/cortex/tables.toml".to_string());
        let result =
            CortexPipeline::from_config_with_model(&config, Arc::new(CountingModel::default()));
        assert!(result.is_err());
    }
}
