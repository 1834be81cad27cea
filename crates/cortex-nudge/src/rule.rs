//! Declarative protocol rules.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cortex_core::types::{Entities, EntityKey, IntentKind, Priority};
use regex::{Regex, RegexBuilder};

/// The value a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionField {
    /// The original text of the completed action.
    Content,
    /// A named entity of the completed action.
    Entity(EntityKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Case-insensitive exact match.
    Equals,
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive regular expression.
    Matches,
    /// Field is present and non-empty; the value is ignored.
    Exists,
}

/// One test against a completed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    pub fn new(field: ConditionField, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    pub fn content_matches(pattern: impl Into<String>) -> Self {
        Self::new(ConditionField::Content, Operator::Matches, pattern)
    }

    pub fn content_contains(value: impl Into<String>) -> Self {
        Self::new(ConditionField::Content, Operator::Contains, value)
    }

    pub fn entity_equals(key: EntityKey, value: impl Into<String>) -> Self {
        Self::new(ConditionField::Entity(key), Operator::Equals, value)
    }

    pub fn entity_exists(key: EntityKey) -> Self {
        Self::new(ConditionField::Entity(key), Operator::Exists, "")
    }

    /// Compile the pattern of a `matches` condition.
    pub(crate) fn compile(&self) -> Option<Result<Regex, regex::Error>> {
        (self.operator == Operator::Matches).then(|| {
            RegexBuilder::new(&self.value)
                .case_insensitive(true)
                .build()
        })
    }

    /// Evaluate against a field value. `pattern` is the compiled form of a
    /// `matches` condition; `None` means it did not compile.
    pub(crate) fn holds(&self, field: Option<&str>, pattern: Option<&Regex>) -> bool {
        let Some(field) = field.filter(|f| !f.trim().is_empty()) else {
            return false;
        };
        match self.operator {
            Operator::Exists => true,
            Operator::Equals => field.to_lowercase() == self.value.to_lowercase(),
            Operator::Contains => field
                .to_lowercase()
                .contains(&self.value.to_lowercase()),
            Operator::Matches => pattern.is_some_and(|re| re.is_match(field)),
        }
    }
}

/// Builds the entities of the suggested action from those of the completed
/// one.
pub type Prefill = Arc<dyn Fn(&Entities) -> Entities + Send + Sync>;

/// What a rule proposes when it fires.
#[derive(Clone)]
pub struct SuggestionTemplate {
    pub intent: IntentKind,
    pub message: String,
    pub prefill: Prefill,
}

impl fmt::Debug for SuggestionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuggestionTemplate")
            .field("intent", &self.intent)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Intent plus conditions, all of which must hold.
#[derive(Debug, Clone)]
pub struct RuleTrigger {
    pub intent: IntentKind,
    pub conditions: Vec<Condition>,
}

/// Citation of the care protocol a rule implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolReference {
    pub source: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProtocolRule {
    pub id: String,
    pub name: String,
    pub trigger: RuleTrigger,
    pub suggestion: SuggestionTemplate,
    pub priority: Priority,
    pub enabled: bool,
    /// Lifetime of the suggestion; the engine default when `None`.
    pub expires_after: Option<Duration>,
    pub protocol: Option<ProtocolReference>,
}

/// Prefill that carries the patient reference forward and adds `extra`.
pub fn carry_patient(extra: Entities) -> Prefill {
    Arc::new(move |source: &Entities| {
        let mut carried = Entities::default();
        carried.set(
            EntityKey::PatientName,
            source.patient_reference().map(str::to_string),
        );
        carried.set(
            EntityKey::PatientId,
            source.get(EntityKey::PatientId).map(str::to_string),
        );
        carried.overlay(&extra)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::types::AppointmentIdentifier;

    fn holds(condition: &Condition, field: Option<&str>) -> bool {
        let compiled = condition.compile().and_then(Result::ok);
        condition.holds(field, compiled.as_ref())
    }

    #[test]
    fn test_equals_ignores_case() {
        let c = Condition::entity_equals(EntityKey::Category, "Incident");
        assert!(holds(&c, Some("incident")));
        assert!(!holds(&c, Some("incidenten")));
    }

    #[test]
    fn test_contains_ignores_case() {
        let c = Condition::content_contains("WOND");
        assert!(holds(&c, Some("Wondverband vervangen")));
        assert!(!holds(&c, Some("verband vervangen")));
    }

    #[test]
    fn test_matches_ignores_case() {
        let c = Condition::content_matches(r"wou?nd");
        assert!(holds(&c, Some("Wound dressing changed")));
        assert!(holds(&c, Some("WOND verzorgd")));
        assert!(!holds(&c, Some("verband")));
    }

    #[test]
    fn test_exists_ignores_value() {
        let c = Condition::new(
            ConditionField::Entity(EntityKey::PatientName),
            Operator::Exists,
            "whatever",
        );
        assert!(holds(&c, Some("Jansen")));
        assert!(!holds(&c, Some("  ")));
        assert!(!holds(&c, None));
    }

    #[test]
    fn test_missing_field_never_matches() {
        for c in [
            Condition::entity_equals(EntityKey::Category, ""),
            Condition::content_contains(""),
            Condition::content_matches(".*"),
        ] {
            assert!(!holds(&c, None), "{:?}", c);
            assert!(!holds(&c, Some("")), "{:?}", c);
        }
    }

    #[test]
    fn test_malformed_pattern_does_not_match() {
        let c = Condition::content_matches(r"(wond");
        assert!(matches!(c.compile(), Some(Err(_))));
        assert!(!holds(&c, Some("(wond")));
    }

    #[test]
    fn test_only_matches_conditions_compile() {
        assert!(Condition::content_contains("(").compile().is_none());
    }

    #[test]
    fn test_carry_patient_prefill() {
        let mut extra = Entities::default();
        extra.set(EntityKey::AppointmentType, Some("wondcontrole".to_string()));
        let prefill = carry_patient(extra);

        let source = Entities {
            identifier: Some(AppointmentIdentifier {
                patient_name: Some("Jansen".to_string()),
                date: None,
                time: None,
            }),
            content: Some("wond verzorgd".to_string()),
            ..Default::default()
        };
        let out = prefill(&source);
        assert_eq!(out.get(EntityKey::PatientName), Some("Jansen"));
        assert_eq!(out.get(EntityKey::AppointmentType), Some("wondcontrole"));
        assert!(out.get(EntityKey::Content).is_none());
    }
}
