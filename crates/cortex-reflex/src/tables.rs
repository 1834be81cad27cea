//! Replaceable wording of the local classifier.
//!
//! Trigger phrases, intent patterns and entity cues are plain data so a
//! deployment can swap the built-in Dutch phrasing for its own via TOML.
//! All patterns are compiled case-insensitively, except the patient-name
//! capture which relies on capitalisation.

use std::path::Path;

use cortex_core::error::Result;
use cortex_core::types::IntentKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete table set injected into a [`crate::ReflexClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexTables {
    pub triggers: TriggerTables,
    pub intents: Vec<IntentPatterns>,
    pub entities: EntityTables,
}

/// Escalation trigger patterns, evaluated in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerTables {
    /// Coordinated action verbs or sequencing adverbs.
    pub multi_intent: Vec<String>,
    /// Pronouns and demonstratives that point at an earlier referent.
    pub context: Vec<String>,
    /// Expressions that need today's date to resolve.
    pub relative_time: Vec<String>,
}

/// Ordered pattern list of one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPatterns {
    pub intent: IntentKind,
    pub patterns: Vec<WeightedPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPattern {
    pub pattern: String,
    /// Confidence contributed by a match, within (0, 1].
    pub weight: f64,
}

/// Cues for local entity extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTables {
    /// Words that introduce a patient name ("voor Jansen").
    pub patient_cues: Vec<String>,
    /// Forms of address kept as part of the name ("mevrouw Jansen").
    pub titles: Vec<String>,
    /// Lowercase name particles ("van der Berg").
    pub name_particles: Vec<String>,
    /// Words before a whole hour ("om 10 uur").
    pub hour_cues: Vec<String>,
    /// Words after a whole hour.
    pub hour_words: Vec<String>,
    /// Separates the current from the new moment when rescheduling.
    pub reschedule_marker: String,
    /// Note categories, first hit wins.
    pub categories: Vec<CategoryKeywords>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: String,
    /// Word prefixes; "wond" also covers "wondverzorging".
    pub keywords: Vec<String>,
}

impl ReflexTables {
    /// Load tables from a TOML file. Sections left out keep the built-in
    /// Dutch defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let tables = Self::from_toml_str(&content)?;
        info!("Reflex tables loaded from {}", path.display());
        Ok(tables)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Patterns for one intent, if the table has any.
    pub fn patterns_for(&self, intent: IntentKind) -> Option<&IntentPatterns> {
        self.intents.iter().find(|p| p.intent == intent)
    }
}

impl Default for ReflexTables {
    fn default() -> Self {
        Self {
            triggers: TriggerTables::default(),
            intents: dutch_intent_patterns(),
            entities: EntityTables::default(),
        }
    }
}

const ACTION_VERBS: &str = "maak|plan|boek|zoek|vind|open|toon|bekijk|annuleer|zeg|verplaats|verzet|noteer|schrijf|start|begin";

impl Default for TriggerTables {
    fn default() -> Self {
        Self {
            multi_intent: vec![
                format!(r"\b(?:{ACTION_VERBS})\b.*\b(?:en|en\s+dan|en\s+daarna|daarna|vervolgens)\s+(?:{ACTION_VERBS})\b"),
                r"\b(?:eerst|daarna|vervolgens|tenslotte|ten\s+slotte)\b".to_string(),
            ],
            context: vec![
                r"\b(?:hem|haar|hen|diegene|dezelfde|diezelfde)\b".to_string(),
                r"\b(?:die|deze|dat|dit)\s+(?:patiënt|patient|cliënt|client|afspraak|meneer|mevrouw)\b"
                    .to_string(),
                r"\b(?:zelfde|vorige)\s+(?:patiënt|patient|cliënt|client)\b".to_string(),
            ],
            relative_time: vec![
                r"\b(?:over)?morgen(?:ochtend|middag|avond)?\b".to_string(),
                r"\b(?:eer)?gisteren\b".to_string(),
                r"\b(?:vanmiddag|vanavond|vannacht|straks)\b".to_string(),
                r"\b(?:volgende|komende|aanstaande)\s+(?:week|maand|keer)\b".to_string(),
                r"\bover\s+(?:\d+|een|twee|drie|vier|vijf|zes|zeven)\s+(?:dag(?:en)?|we(?:e)?k(?:en)?|uur|maand(?:en)?)\b"
                    .to_string(),
                r"\b(?:volgende|komende|aanstaande|deze|vorige|afgelopen)\s+(?:maandag|dinsdag|woensdag|donderdag|vrijdag|zaterdag|zondag)(?:ochtend|middag|avond)?\b"
                    .to_string(),
            ],
        }
    }
}

impl Default for EntityTables {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            patient_cues: words(&[
                "voor", "bij", "van", "met", "patiënt", "patient", "cliënt", "client", "zoek", "vind",
            ]),
            titles: words(&["mevrouw", "meneer", "mw.", "dhr.", "mevr."]),
            name_particles: words(&["van", "de", "der", "den", "ter", "ten", "het", "in", "'t"]),
            hour_cues: words(&["om", "rond"]),
            hour_words: words(&["uur"]),
            reschedule_marker: "naar".to_string(),
            categories: vec![
                category("wondzorg", &["wond", "decubitus", "verband"]),
                category("incident", &["gevallen", "val", "valincident", "incident"]),
                category("vitale functies", &["koorts", "temperatuur", "bloeddruk", "saturatie", "pols"]),
                category("medicatie", &["medicatie", "medicijn", "tablet", "insuline"]),
                category("pijn", &["pijn"]),
                category("voeding", &["gegeten", "gedronken", "eten", "drinken", "voeding"]),
                category("mobiliteit", &["mobiliseert", "rollator", "transfer", "lopen"]),
            ],
        }
    }
}

fn category(name: &str, keywords: &[&str]) -> CategoryKeywords {
    CategoryKeywords {
        category: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn intent(intent: IntentKind, patterns: &[(&str, f64)]) -> IntentPatterns {
    IntentPatterns {
        intent,
        patterns: patterns
            .iter()
            .map(|(pattern, weight)| WeightedPattern {
                pattern: pattern.to_string(),
                weight: *weight,
            })
            .collect(),
    }
}

/// Built-in Dutch command phrasing, one list per actionable intent.
pub fn dutch_intent_patterns() -> Vec<IntentPatterns> {
    vec![
        // =====================================================================
        // Report notes
        // =====================================================================
        intent(
            IntentKind::Note,
            &[
                (r"\b(?:maak|schrijf)\s+(?:een\s+)?(?:notitie|rapportage|aantekening)\b", 0.95),
                (r"^\s*(?:notitie|rapportage)\b", 0.92),
                (r"\bnoteer\b", 0.9),
                (r"\brapporteer\b", 0.88),
                (r"\b(?:notitie|rapportage)\b", 0.75),
            ],
        ),
        // =====================================================================
        // Patient lookup
        // =====================================================================
        intent(
            IntentKind::PatientSearch,
            &[
                (r"\b(?:zoek|vind)\s+(?:de\s+|het\s+)?(?:patiënt|patient|cliënt|client|dossier)\b", 0.95),
                (r"\bopen\s+(?:het\s+)?dossier\b", 0.9),
                (r"\bwaar\s+ligt\b", 0.82),
                (r"\b(?:zoek|vind)\b", 0.6),
            ],
        ),
        // =====================================================================
        // Shift handover
        // =====================================================================
        intent(
            IntentKind::Handover,
            &[
                (r"\b(?:start|begin)\s+(?:de\s+)?(?:dienst)?overdracht\b", 1.0),
                (r"\bdienstoverdracht\b", 0.95),
                (r"\boverdracht\b", 0.85),
            ],
        ),
        // =====================================================================
        // Agenda
        // =====================================================================
        intent(
            IntentKind::ScheduleView,
            &[
                (r"\b(?:toon|open|bekijk)\s+(?:de\s+|mijn\s+)?(?:agenda|planning|rooster)\b", 0.95),
                (r"\bwat\s+staat\s+er\s+(?:vandaag\s+)?(?:gepland|op\s+de\s+(?:agenda|planning))\b", 0.9),
                (r"\b(?:agenda|planning)\s+(?:van\s+)?vandaag\b", 0.88),
                (r"\b(?:agenda|planning|rooster)\b", 0.7),
            ],
        ),
        // =====================================================================
        // Appointments
        // =====================================================================
        intent(
            IntentKind::CreateAppointment,
            &[
                (r"\b(?:maak|plan|boek)\s+(?:een\s+)?(?:nieuwe\s+)?afspraak\b", 0.95),
                (r"\bnieuwe\s+afspraak\b", 0.9),
                (r"\bafspraak\s+(?:maken|inplannen|boeken)\b", 0.9),
                (r"\bafspraak\b", 0.55),
            ],
        ),
        intent(
            IntentKind::CancelAppointment,
            &[
                (r"\b(?:annuleer|zeg)\b.*\bafspraak\b", 0.95),
                (r"\bafspraak\b.*\b(?:annuleren|afzeggen|schrappen)\b", 0.95),
                (r"\bannuleer\b", 0.8),
            ],
        ),
        intent(
            IntentKind::RescheduleAppointment,
            &[
                (r"\b(?:verplaats|verzet)\b.*\bafspraak\b", 0.95),
                (r"\bafspraak\b.*\b(?:verplaatsen|verzetten|omzetten)\b", 0.95),
                (r"\b(?:verplaats|verzet)\b", 0.8),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_tables_cover_every_actionable_intent() {
        let tables = ReflexTables::default();
        for kind in IntentKind::ALL {
            let present = tables.patterns_for(kind).is_some();
            assert_eq!(present, kind != IntentKind::Unknown, "intent {}", kind);
        }
    }

    #[test]
    fn test_default_weights_in_range() {
        for list in ReflexTables::default().intents {
            for p in list.patterns {
                assert!(p.weight > 0.0 && p.weight <= 1.0, "{}", p.pattern);
            }
        }
    }

    #[test]
    fn test_partial_toml_keeps_default_sections() {
        let tables = ReflexTables::from_toml_str(
            r#"
[triggers]
relative_time = ["\\btomorrow\\b"]
"#,
        )
        .unwrap();
        assert_eq!(tables.triggers.relative_time, vec![r"\btomorrow\b"]);
        // Fields left out of a section fall back too.
        assert_eq!(tables.triggers.multi_intent, TriggerTables::default().multi_intent);
        assert_eq!(tables.intents, dutch_intent_patterns());
    }

    #[test]
    fn test_load_intent_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[[intents]]
intent = "handover"
patterns = [{ pattern = "\\bhandover\\b", weight = 1.0 }]
"#,
        )
        .unwrap();
        let tables = ReflexTables::load(file.path()).unwrap();
        assert_eq!(tables.intents.len(), 1);
        assert_eq!(tables.intents[0].intent, IntentKind::Handover);
        assert!(!tables.entities.patient_cues.is_empty());
    }

    #[test]
    fn test_unknown_intent_name_rejected() {
        let result = ReflexTables::from_toml_str(
            r#"
[[intents]]
intent = "prescribe"
patterns = []
"#,
        );
        assert!(result.is_err());
    }
}
