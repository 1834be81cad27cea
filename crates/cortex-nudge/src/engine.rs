//! Rule evaluation over completed actions.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cortex_core::config::NudgeConfig;
use cortex_core::telemetry::{PipelineEvent, Telemetry};
use cortex_core::types::{
    Entities, EntityKey, IntentAction, IntentKind, NudgeStatus, NudgeSuggestion, NudgeTrigger,
    SuggestedAction,
};
use regex::Regex;
use uuid::Uuid;

use crate::rule::{ConditionField, ProtocolRule};
use crate::rules::default_rules;

/// Applied to rules without their own expiry.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// A successfully executed action, as seen by the rules.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAction {
    pub action_id: Uuid,
    pub intent: IntentKind,
    pub entities: Entities,
    /// Original text: the dictated content, or the utterance when there is
    /// none.
    pub content: String,
}

impl CompletedAction {
    pub fn from_action(action: &IntentAction, raw_input: &str) -> Self {
        Self {
            action_id: action.id,
            intent: action.intent,
            entities: action.entities.clone(),
            content: action
                .entities
                .get(EntityKey::Content)
                .unwrap_or(raw_input)
                .to_string(),
        }
    }
}

/// A rule with its `matches` patterns compiled. `Err` keeps the compile
/// error for logging.
struct CompiledRule {
    rule: ProtocolRule,
    patterns: Vec<Option<Result<Regex, String>>>,
}

/// Matches completed actions against an ordered rule table.
///
/// Holds no mutable state; suggestions are returned to the caller, who owns
/// their lifecycle.
pub struct NudgeEngine {
    rules: Vec<CompiledRule>,
    enabled: bool,
    default_expiry: Duration,
    telemetry: Telemetry,
}

impl Default for NudgeEngine {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl NudgeEngine {
    pub fn new(rules: Vec<ProtocolRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let patterns = rule
                    .trigger
                    .conditions
                    .iter()
                    .map(|c| c.compile().map(|r| r.map_err(|e| e.to_string())))
                    .collect();
                CompiledRule { rule, patterns }
            })
            .collect();
        Self {
            rules,
            enabled: true,
            default_expiry: DEFAULT_EXPIRY,
            telemetry: Telemetry::default(),
        }
    }

    /// Default rules with the configured expiry and switch.
    pub fn from_config(config: &NudgeConfig) -> Self {
        let mut engine = Self::default()
            .with_default_expiry(Duration::from_secs(config.default_expiry_secs));
        engine.enabled = config.enabled;
        engine
    }

    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rules(&self) -> impl Iterator<Item = &ProtocolRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Suggestions for `action`, highest priority first. Rules of equal
    /// priority keep table order.
    pub fn evaluate(&self, action: &CompletedAction, now: DateTime<Utc>) -> Vec<NudgeSuggestion> {
        if !self.enabled {
            return Vec::new();
        }

        let mut suggestions: Vec<NudgeSuggestion> = self
            .rules
            .iter()
            .filter(|c| self.matches(c, action))
            .map(|c| self.suggest(&c.rule, action, now))
            .collect();
        suggestions.sort_by_key(|s| s.priority.rank());

        for suggestion in &suggestions {
            self.telemetry.nudge_raised(suggestion);
        }
        suggestions
    }

    fn matches(&self, compiled: &CompiledRule, action: &CompletedAction) -> bool {
        let rule = &compiled.rule;
        if !rule.enabled || rule.trigger.intent != action.intent {
            return false;
        }
        rule.trigger
            .conditions
            .iter()
            .zip(&compiled.patterns)
            .all(|(condition, pattern)| {
                let field = match condition.field {
                    ConditionField::Content => Some(action.content.as_str()),
                    ConditionField::Entity(key) => action.entities.get(key),
                };
                let regex = match pattern {
                    Some(Ok(re)) => Some(re),
                    Some(Err(error)) => {
                        self.telemetry.emit(PipelineEvent::RulePatternInvalid {
                            rule_id: rule.id.clone(),
                            pattern: condition.value.clone(),
                            error: error.clone(),
                        });
                        None
                    }
                    None => None,
                };
                condition.holds(field, regex)
            })
    }

    fn suggest(
        &self,
        rule: &ProtocolRule,
        action: &CompletedAction,
        now: DateTime<Utc>,
    ) -> NudgeSuggestion {
        let lifetime = rule.expires_after.unwrap_or(self.default_expiry);
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        NudgeSuggestion {
            id: Uuid::new_v4(),
            trigger: NudgeTrigger {
                action_id: action.action_id,
                intent: action.intent,
                entities: action.entities.clone(),
            },
            suggestion: SuggestedAction {
                rule_id: rule.id.clone(),
                intent: rule.suggestion.intent,
                message: rule.suggestion.message.clone(),
                entities: (rule.suggestion.prefill)(&action.entities),
            },
            status: NudgeStatus::Pending,
            priority: rule.priority,
            expires_at,
            created_at: now,
        }
    }
}

impl std::fmt::Debug for NudgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NudgeEngine")
            .field("rules", &self.rules.len())
            .field("enabled", &self.enabled)
            .field("default_expiry", &self.default_expiry)
            .finish()
    }
}
