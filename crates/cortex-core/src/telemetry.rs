use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::safety::SafetyGate;
use crate::types::{
    ActionStatus, ChainSource, ChainStatus, Entities, EscalationReason, IntentChain, IntentKind,
    LocalClassificationResult, NudgeSuggestion, Priority,
};

/// Observable events of the command pipeline.
///
/// Events carrying free text or entities are sanitised by [`Telemetry`]
/// before they are emitted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum PipelineEvent {
    // =========================================================================
    // Reflex
    // =========================================================================
    /// The local classifier produced a result.
    Classified {
        input: String,
        intent: IntentKind,
        confidence: f64,
        processing_time_ms: f64,
        entities: Entities,
    },

    /// The local result was handed to the orchestrator.
    Escalated {
        input: String,
        reason: EscalationReason,
        entities: Entities,
    },

    // =========================================================================
    // Orchestrator
    // =========================================================================
    /// A chain was built, locally or from a model reply.
    ChainBuilt {
        chain_id: Uuid,
        source: ChainSource,
        intents: Vec<IntentKind>,
        processing_time_ms: f64,
    },

    /// The language model call or its validation failed; an `unknown` chain
    /// was returned instead.
    OrchestrationFailed { chain_id: Uuid, error: String },

    // =========================================================================
    // Chain
    // =========================================================================
    ActionTransition {
        chain_id: Uuid,
        action_id: Uuid,
        from: ActionStatus,
        to: ActionStatus,
    },

    ChainClosed {
        chain_id: Uuid,
        status: ChainStatus,
        dismissed: bool,
    },

    // =========================================================================
    // Nudges
    // =========================================================================
    NudgeRaised {
        suggestion_id: Uuid,
        rule_id: String,
        intent: IntentKind,
        priority: Priority,
        message: String,
    },

    /// A rule condition carried a pattern that does not compile.
    RulePatternInvalid {
        rule_id: String,
        pattern: String,
        error: String,
    },
}

/// Structured, PII-safe event sink on top of `tracing`.
#[derive(Debug, Clone)]
pub struct Telemetry {
    gate: SafetyGate,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

impl Telemetry {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            gate: SafetyGate::new(config),
        }
    }

    /// Sanitise an event and emit it. Returns what was emitted.
    pub fn emit(&self, event: PipelineEvent) -> PipelineEvent {
        let event = self.sanitize(event);
        match &event {
            PipelineEvent::Classified {
                input,
                intent,
                confidence,
                processing_time_ms,
                ..
            } => {
                info!(%intent, confidence, processing_time_ms, input = %input, "Utterance classified");
            }
            PipelineEvent::Escalated { input, reason, .. } => {
                info!(%reason, input = %input, "Escalating to orchestrator");
            }
            PipelineEvent::ChainBuilt {
                chain_id,
                source,
                intents,
                processing_time_ms,
            } => {
                info!(
                    %chain_id,
                    %source,
                    actions = intents.len(),
                    processing_time_ms,
                    "Intent chain built"
                );
            }
            PipelineEvent::OrchestrationFailed { chain_id, error } => {
                warn!(%chain_id, error = %error, "Orchestration failed, falling back to unknown");
            }
            PipelineEvent::ActionTransition {
                chain_id,
                action_id,
                from,
                to,
            } => {
                debug!(%chain_id, %action_id, %from, %to, "Action transition");
            }
            PipelineEvent::ChainClosed {
                chain_id,
                status,
                dismissed,
            } => {
                info!(%chain_id, %status, dismissed, "Chain closed");
            }
            PipelineEvent::NudgeRaised {
                suggestion_id,
                rule_id,
                priority,
                ..
            } => {
                info!(%suggestion_id, rule_id = %rule_id, %priority, "Nudge raised");
            }
            PipelineEvent::RulePatternInvalid {
                rule_id,
                pattern,
                error,
            } => {
                warn!(rule_id = %rule_id, pattern = %pattern, error = %error, "Invalid rule pattern");
            }
        }
        event
    }

    pub fn classified(&self, input: &str, result: &LocalClassificationResult) -> PipelineEvent {
        self.emit(PipelineEvent::Classified {
            input: input.to_string(),
            intent: result.intent,
            confidence: result.confidence,
            processing_time_ms: result.processing_time_ms,
            entities: result.entities.clone(),
        })
    }

    /// `entities` are the classifier's, used to scrub the patient name.
    pub fn escalated(
        &self,
        input: &str,
        reason: EscalationReason,
        entities: &Entities,
    ) -> PipelineEvent {
        self.emit(PipelineEvent::Escalated {
            input: input.to_string(),
            reason,
            entities: entities.clone(),
        })
    }

    pub fn chain_built(&self, chain: &IntentChain) -> PipelineEvent {
        self.emit(PipelineEvent::ChainBuilt {
            chain_id: chain.id,
            source: chain.metadata.source,
            intents: chain.actions.iter().map(|a| a.intent).collect(),
            processing_time_ms: chain.metadata.processing_time_ms,
        })
    }

    pub fn nudge_raised(&self, suggestion: &NudgeSuggestion) -> PipelineEvent {
        self.emit(PipelineEvent::NudgeRaised {
            suggestion_id: suggestion.id,
            rule_id: suggestion.suggestion.rule_id.clone(),
            intent: suggestion.suggestion.intent,
            priority: suggestion.priority,
            message: suggestion.suggestion.message.clone(),
        })
    }

    fn sanitize(&self, event: PipelineEvent) -> PipelineEvent {
        if !self.gate.is_active() {
            return event;
        }
        match event {
            PipelineEvent::Classified {
                input,
                intent,
                confidence,
                processing_time_ms,
                entities,
            } => PipelineEvent::Classified {
                input: self.redact_input(&input, &entities),
                intent,
                confidence,
                processing_time_ms,
                entities: self.gate.sanitize_entities(&entities),
            },
            PipelineEvent::Escalated {
                input,
                reason,
                entities,
            } => PipelineEvent::Escalated {
                input: self.redact_input(&input, &entities),
                reason,
                entities: self.gate.sanitize_entities(&entities),
            },
            PipelineEvent::OrchestrationFailed { chain_id, error } => {
                PipelineEvent::OrchestrationFailed {
                    chain_id,
                    error: self.gate.redact(&error),
                }
            }
            PipelineEvent::NudgeRaised {
                suggestion_id,
                rule_id,
                intent,
                priority,
                message,
            } => PipelineEvent::NudgeRaised {
                suggestion_id,
                rule_id,
                intent,
                priority,
                message: self.gate.redact(&message),
            },
            other => other,
        }
    }

    /// Scrub identifiers, and also any patient name the classifier found.
    fn redact_input(&self, input: &str, entities: &Entities) -> String {
        let mut text = self.gate.redact(input);
        if let Some(name) = entities.patient_reference() {
            text = text.replace(name, crate::safety::PATIENT_TOKEN);
        }
        text
    }
}
