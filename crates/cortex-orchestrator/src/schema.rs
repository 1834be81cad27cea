//! Strict validation of model replies.
//!
//! A reply is accepted only when it is a single JSON object in one of two
//! shapes, with recognised intents, confidences in `[0, 1]` and known entity
//! keys. Anything else is rejected as a whole; partially valid replies never
//! produce actions.

use cortex_core::types::{Entities, IntentKind};
use serde::Deserialize;

use crate::error::OrchestratorError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReply {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    entities: Option<Entities>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    actions: Option<Vec<RawAction>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    intent: String,
    confidence: f64,
    #[serde(default)]
    entities: Option<Entities>,
}

/// One action proposed by the model, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedAction {
    pub intent: IntentKind,
    pub confidence: f64,
    pub entities: Entities,
}

/// A validated model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub actions: Vec<ProposedAction>,
    pub reasoning: Option<String>,
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body).trim_start();
    // Drop a "json" info string, with or without a newline after it.
    let body = match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &body[4..],
        _ => body,
    };
    body.trim()
}

/// Parse and validate a raw reply.
pub fn parse_reply(raw: &str) -> Result<ModelReply, OrchestratorError> {
    let text = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| OrchestratorError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(OrchestratorError::Schema(
            "reply must be a JSON object".to_string(),
        ));
    }
    let reply: RawReply =
        serde_json::from_value(value).map_err(|e| OrchestratorError::Schema(e.to_string()))?;

    let reasoning = reply.reasoning.filter(|r| !r.trim().is_empty());

    let actions = match reply.actions {
        Some(actions) => {
            if reply.intent.is_some() || reply.confidence.is_some() || reply.entities.is_some() {
                return Err(OrchestratorError::Schema(
                    "`actions` cannot be combined with top-level `intent`, `confidence` or `entities`"
                        .to_string(),
                ));
            }
            if actions.is_empty() {
                return Err(OrchestratorError::Schema(
                    "`actions` must not be empty".to_string(),
                ));
            }
            actions
                .into_iter()
                .map(|a| validate_action(&a.intent, a.confidence, a.entities))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let intent = reply
                .intent
                .ok_or_else(|| OrchestratorError::Schema("missing field `intent`".to_string()))?;
            let confidence = reply.confidence.ok_or_else(|| {
                OrchestratorError::Schema("missing field `confidence`".to_string())
            })?;
            vec![validate_action(&intent, confidence, reply.entities)?]
        }
    };

    Ok(ModelReply { actions, reasoning })
}

fn validate_action(
    intent: &str,
    confidence: f64,
    entities: Option<Entities>,
) -> Result<ProposedAction, OrchestratorError> {
    let intent: IntentKind = intent
        .parse()
        .map_err(|_| OrchestratorError::Schema(format!("unknown intent '{}'", intent)))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(OrchestratorError::Schema(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }
    Ok(ProposedAction {
        intent,
        confidence,
        entities: entities.unwrap_or_default(),
    })
}
