use std::path::Path;
use std::time::Instant;

use cortex_core::config::ReflexConfig;
use cortex_core::types::{
    EscalationReason, IntentKind, LocalClassificationResult, AMBIGUITY_THRESHOLD,
    CONFIDENCE_THRESHOLD,
};
use tracing::debug;

use crate::entities::EntityExtractor;
use crate::error::ReflexError;
use crate::matcher::{MatchScore, RegexMatcher, ScoredMatcher};
use crate::tables::ReflexTables;
use crate::triggers::EscalationTriggers;

/// Fast local classifier.
///
/// Pure and deterministic: holds only compiled tables, performs no I/O and
/// can be shared across threads.
pub struct ReflexClassifier {
    triggers: EscalationTriggers,
    matchers: Vec<Box<dyn ScoredMatcher>>,
    extractor: EntityExtractor,
    confidence_threshold: f64,
    ambiguity_threshold: f64,
}

impl ReflexClassifier {
    /// Compile `tables` with the default thresholds.
    pub fn new(tables: &ReflexTables) -> Result<Self, ReflexError> {
        let matchers = tables
            .intents
            .iter()
            .map(|t| RegexMatcher::new(t).map(|m| Box::new(m) as Box<dyn ScoredMatcher>))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_matchers(tables, matchers)
    }

    /// Use custom matchers in place of the table's intent patterns. Trigger
    /// and entity tables still come from `tables`.
    pub fn with_matchers(
        tables: &ReflexTables,
        matchers: Vec<Box<dyn ScoredMatcher>>,
    ) -> Result<Self, ReflexError> {
        Ok(Self {
            triggers: EscalationTriggers::new(&tables.triggers)?,
            matchers,
            extractor: EntityExtractor::new(&tables.entities)?,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            ambiguity_threshold: AMBIGUITY_THRESHOLD,
        })
    }

    /// Build from configuration, loading replacement tables when a path is
    /// set.
    pub fn from_config(config: &ReflexConfig) -> Result<Self, ReflexError> {
        let tables = match config.tables_path {
            Some(ref path) => ReflexTables::load(Path::new(path))?,
            None => ReflexTables::default(),
        };
        Ok(Self::new(&tables)?
            .with_thresholds(config.confidence_threshold, config.ambiguity_threshold))
    }

    pub fn with_thresholds(mut self, confidence: f64, ambiguity: f64) -> Self {
        self.confidence_threshold = confidence;
        self.ambiguity_threshold = ambiguity;
        self
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn ambiguity_threshold(&self) -> f64 {
        self.ambiguity_threshold
    }

    /// Classify one utterance. Never fails; unusable input yields `unknown`
    /// marked for escalation.
    pub fn classify(&self, input: &str) -> LocalClassificationResult {
        let start = Instant::now();
        let text = input.trim();

        if text.is_empty() {
            return LocalClassificationResult {
                intent: IntentKind::Unknown,
                confidence: 0.0,
                second_intent: None,
                second_confidence: None,
                matched_pattern: None,
                entities: Default::default(),
                processing_time_ms: elapsed_ms(start),
                should_escalate_to_ai: true,
                escalation_reason: Some(EscalationReason::LowConfidence),
            };
        }

        let trigger = self.triggers.detect(text);

        let scores: Vec<MatchScore> = self
            .matchers
            .iter()
            .filter_map(|m| m.best_match(text))
            .collect();
        let (best, second) = rank(&scores);

        let intent = best.map_or(IntentKind::Unknown, |b| b.intent);
        let confidence = best.map_or(0.0, |b| b.weight);
        let second_confidence = second.map(|s| s.weight);

        let escalation_reason = trigger.or_else(|| {
            if confidence < self.confidence_threshold {
                Some(EscalationReason::LowConfidence)
            } else if second_confidence
                .is_some_and(|s| s > 0.0 && confidence - s < self.ambiguity_threshold)
            {
                Some(EscalationReason::Ambiguous)
            } else {
                None
            }
        });

        let result = LocalClassificationResult {
            intent,
            confidence,
            second_intent: second.map(|s| s.intent),
            second_confidence,
            matched_pattern: best.map(|b| b.pattern.clone()),
            entities: self.extractor.extract(text, intent),
            processing_time_ms: elapsed_ms(start),
            should_escalate_to_ai: escalation_reason.is_some(),
            escalation_reason,
        };

        debug!(
            intent = %result.intent,
            confidence = result.confidence,
            escalate = result.should_escalate_to_ai,
            reason = ?result.escalation_reason,
            "Reflex classification"
        );
        result
    }
}

impl std::fmt::Debug for ReflexClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflexClassifier")
            .field("matchers", &self.matchers.len())
            .field("confidence_threshold", &self.confidence_threshold)
            .field("ambiguity_threshold", &self.ambiguity_threshold)
            .finish_non_exhaustive()
    }
}

/// Global best score, and the best score of any other intent. Earlier
/// matchers win ties.
fn rank(scores: &[MatchScore]) -> (Option<&MatchScore>, Option<&MatchScore>) {
    let mut best: Option<&MatchScore> = None;
    for s in scores {
        if best.is_none_or(|b| s.weight > b.weight) {
            best = Some(s);
        }
    }
    let Some(b) = best else {
        return (None, None);
    };
    let mut second: Option<&MatchScore> = None;
    for s in scores.iter().filter(|s| s.intent != b.intent) {
        if second.is_none_or(|c| s.weight > c.weight) {
            second = Some(s);
        }
    }
    (best, second)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{IntentPatterns, WeightedPattern};

    fn classifier() -> ReflexClassifier {
        ReflexClassifier::new(&ReflexTables::default()).unwrap()
    }

    fn tables_with(intents: &[(IntentKind, &str, f64)]) -> ReflexTables {
        ReflexTables {
            intents: intents
                .iter()
                .map(|(intent, pattern, weight)| IntentPatterns {
                    intent: *intent,
                    patterns: vec![WeightedPattern {
                        pattern: pattern.to_string(),
                        weight: *weight,
                    }],
                })
                .collect(),
            ..ReflexTables::default()
        }
    }

    #[test]
    fn test_confident_match_is_accepted_locally() {
        let r = classifier().classify("Toon de agenda");
        assert_eq!(r.intent, IntentKind::ScheduleView);
        assert!(r.confidence >= CONFIDENCE_THRESHOLD);
        assert!(!r.should_escalate_to_ai);
        assert_eq!(r.escalation_reason, None);
        assert!(r.matched_pattern.is_some());
    }

    #[test]
    fn test_note_fast_path_carries_entities() {
        let r = classifier().classify("Notitie voor mevrouw Jansen: wond verzorgd");
        assert_eq!(r.intent, IntentKind::Note);
        assert!(!r.should_escalate_to_ai);
        assert_eq!(r.entities.patient_name.as_deref(), Some("mevrouw Jansen"));
        assert_eq!(r.entities.content.as_deref(), Some("wond verzorgd"));
    }

    #[test]
    fn test_relative_time_escalates() {
        let r = classifier().classify("maak een afspraak voor morgen om 10:00");
        assert!(r.should_escalate_to_ai);
        assert_eq!(r.escalation_reason, Some(EscalationReason::RelativeTime));
        // A best-effort guess is still made.
        assert_eq!(r.intent, IntentKind::CreateAppointment);
    }

    #[test]
    fn test_multi_intent_beats_relative_time() {
        let r = classifier().classify("annuleer de afspraak en plan een nieuwe voor morgen");
        assert_eq!(r.escalation_reason, Some(EscalationReason::MultiIntentDetected));
    }

    #[test]
    fn test_context_pronoun_escalates() {
        let r = classifier().classify("zoek haar dossier");
        assert_eq!(r.escalation_reason, Some(EscalationReason::NeedsContext));
    }

    #[test]
    fn test_trigger_after_colon_still_escalates() {
        let r = classifier().classify("plan een afspraak: morgen om 10:00");
        assert_eq!(r.escalation_reason, Some(EscalationReason::RelativeTime));
        assert!(r.should_escalate_to_ai);

        let r = classifier().classify("zoek patiënt: haar dossier");
        assert_eq!(r.escalation_reason, Some(EscalationReason::NeedsContext));
    }

    #[test]
    fn test_low_confidence_escalates() {
        let r = classifier().classify("afspraak");
        assert_eq!(r.intent, IntentKind::CreateAppointment);
        assert_eq!(r.confidence, 0.55);
        assert_eq!(r.escalation_reason, Some(EscalationReason::LowConfidence));
    }

    #[test]
    fn test_no_match_is_unknown() {
        let r = classifier().classify("het regent buiten");
        assert_eq!(r.intent, IntentKind::Unknown);
        assert_eq!(r.confidence, 0.0);
        assert!(r.matched_pattern.is_none());
        assert_eq!(r.escalation_reason, Some(EscalationReason::LowConfidence));
    }

    #[test]
    fn test_empty_input() {
        for input in ["", "   \t "] {
            let r = classifier().classify(input);
            assert_eq!(r.intent, IntentKind::Unknown);
            assert_eq!(r.confidence, 0.0);
            assert!(r.should_escalate_to_ai);
            assert_eq!(r.escalation_reason, Some(EscalationReason::LowConfidence));
            assert!(r.entities.is_empty());
        }
    }

    #[test]
    fn test_close_second_intent_is_ambiguous() {
        let tables = tables_with(&[
            (IntentKind::ScheduleView, r"\bplanning\b", 0.9),
            (IntentKind::CreateAppointment, r"\bplanning\b", 0.85),
        ]);
        let r = ReflexClassifier::new(&tables).unwrap().classify("planning");
        assert_eq!(r.intent, IntentKind::ScheduleView);
        assert_eq!(r.second_intent, Some(IntentKind::CreateAppointment));
        assert_eq!(r.second_confidence, Some(0.85));
        assert_eq!(r.escalation_reason, Some(EscalationReason::Ambiguous));
    }

    #[test]
    fn test_distant_second_intent_is_not_ambiguous() {
        let tables = tables_with(&[
            (IntentKind::ScheduleView, r"\bplanning\b", 0.95),
            (IntentKind::CreateAppointment, r"\bplanning\b", 0.6),
        ]);
        let r = ReflexClassifier::new(&tables).unwrap().classify("planning");
        assert_eq!(r.second_confidence, Some(0.6));
        assert!(!r.should_escalate_to_ai);
    }

    #[test]
    fn test_equal_weights_keep_table_order() {
        let tables = tables_with(&[
            (IntentKind::Handover, r"\bdienst\b", 0.9),
            (IntentKind::ScheduleView, r"\bdienst\b", 0.9),
        ]);
        let r = ReflexClassifier::new(&tables).unwrap().classify("dienst");
        assert_eq!(r.intent, IntentKind::Handover);
        assert_eq!(r.escalation_reason, Some(EscalationReason::Ambiguous));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let c = classifier();
        for input in [
            "Toon de agenda",
            "maak een notitie en plan een afspraak",
            "verplaats de afspraak van Jansen van 14-03 10:00 naar 15-03 11:30",
            "",
        ] {
            let mut a = c.classify(input);
            let mut b = c.classify(input);
            a.processing_time_ms = 0.0;
            b.processing_time_ms = 0.0;
            assert_eq!(a, b, "{}", input);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let c = classifier().with_thresholds(0.5, 0.15);
        let r = c.classify("afspraak");
        assert!(!r.should_escalate_to_ai);
        assert_eq!(c.confidence_threshold(), 0.5);
    }

    #[test]
    fn test_invalid_table_pattern_rejected_at_construction() {
        let tables = tables_with(&[(IntentKind::Note, r"(notitie", 0.9)]);
        assert!(matches!(
            ReflexClassifier::new(&tables),
            Err(ReflexError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_from_config_missing_tables_file() {
        let config = ReflexConfig {
            tables_path: Some("/nonexistent/tables.toml".to_string()),
            ..ReflexConfig::default()
        };
        assert!(matches!(
            ReflexClassifier::from_config(&config),
            Err(ReflexError::Tables(_))
        ));
    }

    #[test]
    fn test_processing_time_recorded() {
        let r = classifier().classify("start de overdracht");
        assert_eq!(r.intent, IntentKind::Handover);
        assert_eq!(r.confidence, 1.0);
        assert!(r.processing_time_ms >= 0.0);
    }

    struct FixedMatcher(IntentKind, f64);

    impl ScoredMatcher for FixedMatcher {
        fn intent(&self) -> IntentKind {
            self.0
        }

        fn best_match(&self, _text: &str) -> Option<MatchScore> {
            Some(MatchScore {
                intent: self.0,
                weight: self.1,
                pattern: "fixed".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_matchers() {
        let c = ReflexClassifier::with_matchers(
            &ReflexTables::default(),
            vec![
                Box::new(FixedMatcher(IntentKind::PatientSearch, 0.9)),
                Box::new(FixedMatcher(IntentKind::Note, 0.3)),
            ],
        )
        .unwrap();
        let r = c.classify("anything");
        assert_eq!(r.intent, IntentKind::PatientSearch);
        assert_eq!(r.matched_pattern.as_deref(), Some("fixed"));
        assert!(!r.should_escalate_to_ai);
    }
}
