//! Integration tests for swapping the classifier's wording through TOML.

use std::io::Write;

use cortex_core::config::ReflexConfig;
use cortex_core::types::{EscalationReason, IntentKind};
use cortex_reflex::{ReflexClassifier, ReflexError};

// =============================================================================
// Helpers
// =============================================================================

const ENGLISH_TABLES: &str = r#"
[triggers]
multi_intent = ["\\band\\s+then\\b"]
context = ["\\b(?:him|her|them)\\b"]
relative_time = ["\\btomorrow\\b", "\\bnext\\s+week\\b"]

[[intents]]
intent = "note"
patterns = [
    { pattern = "^note\\b", weight = 0.95 },
    { pattern = "\\bnote\\b", weight = 0.7 },
]

[[intents]]
intent = "schedule_view"
patterns = [{ pattern = "\\bshow\\s+(?:the\\s+)?schedule\\b", weight = 1.0 }]

[[intents]]
intent = "create_appointment"
patterns = [{ pattern = "\\bbook\\s+(?:an\\s+)?appointment\\b", weight = 0.9 }]

[entities]
patient_cues = ["for", "with"]
titles = ["mrs", "mr"]
name_particles = ["van", "de"]
reschedule_marker = "to"
categories = [{ category = "wound care", keywords = ["wound"] }]
"#;

fn write_tables(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn english_classifier() -> (ReflexClassifier, tempfile::NamedTempFile) {
    let file = write_tables(ENGLISH_TABLES);
    let config = ReflexConfig {
        tables_path: Some(file.path().display().to_string()),
        ..ReflexConfig::default()
    };
    (ReflexClassifier::from_config(&config).unwrap(), file)
}

// =============================================================================
// Replacement tables
// =============================================================================

#[test]
fn test_english_note_with_entities() {
    let (classifier, _file) = english_classifier();
    let r = classifier.classify("Note for mrs Smith: wound dressing changed");
    assert_eq!(r.intent, IntentKind::Note);
    assert!(!r.should_escalate_to_ai);
    assert_eq!(r.entities.patient_name.as_deref(), Some("mrs Smith"));
    assert_eq!(r.entities.content.as_deref(), Some("wound dressing changed"));
    assert_eq!(r.entities.category.as_deref(), Some("wound care"));
}

#[test]
fn test_english_triggers() {
    let (classifier, _file) = english_classifier();
    assert_eq!(
        classifier
            .classify("book an appointment tomorrow")
            .escalation_reason,
        Some(EscalationReason::RelativeTime)
    );
    assert_eq!(
        classifier
            .classify("show schedule and then book an appointment for her tomorrow")
            .escalation_reason,
        Some(EscalationReason::MultiIntentDetected)
    );
}

#[test]
fn test_dutch_wording_no_longer_matches() {
    let (classifier, _file) = english_classifier();
    let r = classifier.classify("Toon de agenda");
    assert_eq!(r.intent, IntentKind::Unknown);
    assert_eq!(r.escalation_reason, Some(EscalationReason::LowConfidence));
}

#[test]
fn test_thresholds_from_config_apply() {
    let file = write_tables(ENGLISH_TABLES);
    let config = ReflexConfig {
        confidence_threshold: 0.95,
        ambiguity_threshold: 0.15,
        tables_path: Some(file.path().display().to_string()),
    };
    let classifier = ReflexClassifier::from_config(&config).unwrap();
    let r = classifier.classify("book an appointment");
    assert_eq!(r.confidence, 0.9);
    assert_eq!(r.escalation_reason, Some(EscalationReason::LowConfidence));
}

#[test]
fn test_broken_pattern_in_file_is_rejected() {
    let file = write_tables(
        r#"
[triggers]
context = ["(unclosed"]
"#,
    );
    let config = ReflexConfig {
        tables_path: Some(file.path().display().to_string()),
        ..ReflexConfig::default()
    };
    let err = ReflexClassifier::from_config(&config).unwrap_err();
    match err {
        ReflexError::InvalidPattern { table, pattern, .. } => {
            assert_eq!(table, "triggers.context");
            assert_eq!(pattern, "(unclosed");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_rejected() {
    let file = write_tables("[[intents]\nintent = ");
    let config = ReflexConfig {
        tables_path: Some(file.path().display().to_string()),
        ..ReflexConfig::default()
    };
    assert!(matches!(
        ReflexClassifier::from_config(&config),
        Err(ReflexError::Tables(_))
    ));
}
