//! Built-in Dutch protocol rules.

use std::sync::Arc;
use std::time::Duration;

use cortex_core::types::{Entities, EntityKey, IntentKind, Priority};

use crate::rule::{
    carry_patient, Condition, ProtocolReference, ProtocolRule, RuleTrigger, SuggestionTemplate,
};

pub const WOUND_CARE_MESSAGE: &str =
    "Wondzorg vastgelegd. Wilt u een wondcontrole inplannen over 3 dagen?";
pub const FALL_RISK_MESSAGE: &str =
    "Valincident gemeld. Valrisico-inventarisatie uitvoeren en vastleggen?";
pub const FEVER_MESSAGE: &str =
    "Verhoogde temperatuur genoteerd. Controle vitale functies binnen een uur inplannen?";
pub const MEDICATION_REVIEW_MESSAGE: &str =
    "Medicatie gerapporteerd. Medicatieoverzicht van de patiënt nalopen?";
pub const REBOOK_MESSAGE: &str = "Afspraak geannuleerd. Direct een nieuwe afspraak maken?";
pub const HANDOVER_SCHEDULE_MESSAGE: &str = "Overdracht gestart. Agenda van deze dienst bekijken?";
pub const PAIN_SCORE_MESSAGE: &str = "Pijn gerapporteerd. Pijnscore (NRS) vastleggen?";

fn with(key: EntityKey, value: &str) -> Entities {
    let mut e = Entities::default();
    e.set(key, Some(value.to_string()));
    e
}

fn reference(source: &str, section: Option<&str>) -> Option<ProtocolReference> {
    Some(ProtocolReference {
        source: source.to_string(),
        section: section.map(str::to_string),
    })
}

/// The default rule table, in evaluation order.
pub fn default_rules() -> Vec<ProtocolRule> {
    vec![
        ProtocolRule {
            id: "wound-care-followup".to_string(),
            name: "Wondcontrole na wondzorg".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Note,
                conditions: vec![Condition::content_matches(r"wou?nd")],
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::CreateAppointment,
                message: WOUND_CARE_MESSAGE.to_string(),
                prefill: carry_patient(with(EntityKey::AppointmentType, "wondcontrole")),
            },
            priority: Priority::Medium,
            enabled: true,
            expires_after: None,
            protocol: reference("V&VN Richtlijn Wondzorg", Some("Evaluatie wondbeleid")),
        },
        ProtocolRule {
            id: "fall-risk-assessment".to_string(),
            name: "Valrisico na valincident".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Note,
                conditions: vec![
                    Condition::entity_equals(EntityKey::Category, "incident"),
                    Condition::content_matches(r"\b(?:gevallen|val|valincident|uit\s+bed)\b"),
                ],
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::Note,
                message: FALL_RISK_MESSAGE.to_string(),
                prefill: carry_patient(with(EntityKey::Category, "valrisico")),
            },
            priority: Priority::High,
            enabled: true,
            expires_after: Some(Duration::from_secs(15 * 60)),
            protocol: reference("VMS Veiligheidsprogramma", Some("Kwetsbare ouderen: vallen")),
        },
        ProtocolRule {
            id: "fever-vitals-recheck".to_string(),
            name: "Hercontrole bij koorts".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Note,
                conditions: vec![Condition::content_matches(
                    r"\bkoorts|\b(?:temp(?:eratuur)?)\s*(?:van\s+)?(?:3[89]|4[0-2])(?:[.,]\d)?\b",
                )],
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::CreateAppointment,
                message: FEVER_MESSAGE.to_string(),
                prefill: carry_patient(with(
                    EntityKey::AppointmentType,
                    "controle vitale functies",
                )),
            },
            priority: Priority::High,
            enabled: true,
            expires_after: Some(Duration::from_secs(30 * 60)),
            protocol: reference("NEWS2 Vroegsignalering", None),
        },
        ProtocolRule {
            id: "medication-review".to_string(),
            name: "Medicatieoverzicht nalopen".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Note,
                conditions: vec![Condition::entity_equals(EntityKey::Category, "medicatie")],
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::PatientSearch,
                message: MEDICATION_REVIEW_MESSAGE.to_string(),
                prefill: carry_patient(Entities::default()),
            },
            priority: Priority::Low,
            enabled: true,
            expires_after: None,
            protocol: reference("Richtlijn Overdracht van medicatiegegevens in de keten", None),
        },
        ProtocolRule {
            id: "rebook-after-cancel".to_string(),
            name: "Nieuwe afspraak na annulering".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::CancelAppointment,
                conditions: Vec::new(),
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::CreateAppointment,
                message: REBOOK_MESSAGE.to_string(),
                prefill: carry_patient(Entities::default()),
            },
            priority: Priority::Medium,
            enabled: true,
            expires_after: None,
            protocol: None,
        },
        ProtocolRule {
            id: "handover-schedule-check".to_string(),
            name: "Agenda na overdracht".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Handover,
                conditions: Vec::new(),
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::ScheduleView,
                message: HANDOVER_SCHEDULE_MESSAGE.to_string(),
                prefill: Arc::new(|_: &Entities| Entities::default()),
            },
            priority: Priority::Low,
            enabled: true,
            expires_after: None,
            protocol: None,
        },
        ProtocolRule {
            id: "pain-score".to_string(),
            name: "Pijnscore bij pijnklachten".to_string(),
            trigger: RuleTrigger {
                intent: IntentKind::Note,
                conditions: vec![Condition::content_matches(r"\bpijn")],
            },
            suggestion: SuggestionTemplate {
                intent: IntentKind::Note,
                message: PAIN_SCORE_MESSAGE.to_string(),
                prefill: carry_patient(with(EntityKey::Category, "pijn")),
            },
            priority: Priority::Medium,
            // Off until the NRS form exists in the record.
            enabled: false,
            expires_after: None,
            protocol: reference("Richtlijn Pijn", Some("Pijnmeting")),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_ids_are_unique() {
        let rules = default_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_default_patterns_compile() {
        for rule in default_rules() {
            for c in &rule.trigger.conditions {
                if let Some(compiled) = c.compile() {
                    assert!(compiled.is_ok(), "rule {} pattern {}", rule.id, c.value);
                }
            }
        }
    }

    #[test]
    fn test_pain_rule_ships_disabled() {
        let rules = default_rules();
        let pain = rules.iter().find(|r| r.id == "pain-score").unwrap();
        assert!(!pain.enabled);
        assert_eq!(rules.iter().filter(|r| !r.enabled).count(), 1);
    }
}
