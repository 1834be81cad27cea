//! Best-effort entity extraction for the fast path.
//!
//! Only what can be read off the utterance literally: a capitalised patient
//! name after a cue, clock times, absolute dates and dictated content.
//! Anything relative or referential is left to the orchestrator.

use cortex_core::types::{AppointmentIdentifier, Entities, IntentKind};
use regex::Regex;

use crate::error::ReflexError;
use crate::matcher::compile;
use crate::tables::EntityTables;
use crate::triggers::{command_head, command_tail};

const NAME_WORD: &str = r"\p{Lu}[\p{L}'\-]*";

pub struct EntityExtractor {
    titled_name: Option<Regex>,
    cued_name: Option<Regex>,
    clock_time: Regex,
    hour_time: Option<Regex>,
    iso_date: Regex,
    day_month: Regex,
    reschedule_marker: Option<Regex>,
    categories: Vec<(String, Regex)>,
}

/// A patient, date and time read from one stretch of text.
#[derive(Debug, Default, Clone, PartialEq)]
struct Moment {
    patient_name: Option<String>,
    date: Option<String>,
    time: Option<String>,
}

impl EntityExtractor {
    pub fn new(tables: &EntityTables) -> Result<Self, ReflexError> {
        let alternation = |words: &[String]| {
            words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|")
        };
        let particles = alternation(&tables.name_particles);
        let surname = if particles.is_empty() {
            format!(r"{NAME_WORD}(?:\s+{NAME_WORD})?")
        } else {
            format!(r"(?:(?i:{particles})\s+)*{NAME_WORD}(?:\s+{NAME_WORD})?")
        };

        // Name patterns stay case-sensitive: capitalisation marks the name.
        let titled_name = match alternation(&tables.titles) {
            titles if titles.is_empty() => None,
            titles => Some(build(
                &format!(r"\b((?i:{titles})\s+{surname})"),
                "entities.titles",
            )?),
        };
        let cued_name = match alternation(&tables.patient_cues) {
            cues if cues.is_empty() => None,
            cues => Some(build(
                &format!(r"\b(?i:{cues})\s+({surname})"),
                "entities.patient_cues",
            )?),
        };

        let reschedule_marker = if tables.reschedule_marker.trim().is_empty() {
            None
        } else {
            Some(compile(
                &format!(r"\b{}\b", regex::escape(tables.reschedule_marker.trim())),
                "entities.reschedule_marker",
            )?)
        };

        let hour = r"([01]?\d|2[0-3])";
        let hour_time = match (alternation(&tables.hour_cues), alternation(&tables.hour_words)) {
            (cues, words) if cues.is_empty() && words.is_empty() => None,
            (cues, words) if words.is_empty() => Some(format!(r"\b(?:{cues})\s+{hour}\b")),
            (cues, words) if cues.is_empty() => Some(format!(r"\b{hour}\s*(?:{words})\b")),
            (cues, words) => Some(format!(r"\b(?:{cues})\s+{hour}\s*(?:{words})\b")),
        }
        .map(|pattern| compile(&pattern, "entities.hour_cues"))
        .transpose()?;

        let mut categories = Vec::with_capacity(tables.categories.len());
        for c in &tables.categories {
            if c.keywords.is_empty() {
                continue;
            }
            let re = compile(
                &format!(r"\b(?:{})", alternation(&c.keywords)),
                "entities.categories",
            )?;
            categories.push((c.category.clone(), re));
        }

        Ok(Self {
            titled_name,
            cued_name,
            clock_time: build(r"\b([01]?\d|2[0-3]):([0-5]\d)\b", "entities.time")?,
            hour_time,
            iso_date: build(r"\b(\d{4})-(\d{2})-(\d{2})\b", "entities.date")?,
            day_month: build(r"\b(\d{1,2})[-/](\d{1,2})(?:[-/](\d{4}))?\b", "entities.date")?,
            reschedule_marker,
            categories,
        })
    }

    /// Extract the entities relevant to `intent` from `text`.
    pub fn extract(&self, text: &str, intent: IntentKind) -> Entities {
        let head = command_head(text);
        let mut entities = Entities::default();

        match intent {
            IntentKind::Note => {
                entities.patient_name = self.patient_name(head);
                let content = command_tail(text).unwrap_or(text).trim();
                entities.category = self.category(content);
                entities.content = Some(content.to_string());
            }
            IntentKind::PatientSearch | IntentKind::Unknown => {
                entities.patient_name = self.patient_name(head);
            }
            IntentKind::Handover => {}
            IntentKind::ScheduleView => {
                entities.date = self.date(head);
            }
            IntentKind::CreateAppointment => {
                let moment = self.moment(head);
                entities.patient_name = moment.patient_name;
                entities.date = moment.date;
                entities.time = moment.time;
            }
            IntentKind::CancelAppointment => {
                entities.identifier = identifier(self.moment(head));
            }
            IntentKind::RescheduleAppointment => {
                let (current, new) = match self.reschedule_marker.as_ref().and_then(|m| m.find(head)) {
                    Some(m) => (&head[..m.start()], Some(&head[m.end()..])),
                    None => (head, None),
                };
                entities.identifier = identifier(self.moment(current));
                if let Some(new) = new {
                    entities.new_date = self.date(new);
                    entities.new_time = self.time(new);
                }
            }
        }

        entities
    }

    pub fn patient_name(&self, text: &str) -> Option<String> {
        let titled = self.titled_name.as_ref().and_then(|re| re.captures(text));
        titled
            .or_else(|| self.cued_name.as_ref().and_then(|re| re.captures(text)))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Clock time as `HH:MM`.
    pub fn time(&self, text: &str) -> Option<String> {
        if let Some(c) = self.clock_time.captures(text) {
            let hour: u32 = c[1].parse().ok()?;
            return Some(format!("{:02}:{}", hour, &c[2]));
        }
        let c = self.hour_time.as_ref()?.captures(text)?;
        let hour: u32 = c[1].parse().ok()?;
        Some(format!("{:02}:00", hour))
    }

    /// Absolute date: `YYYY-MM-DD` when the year is known, `DD-MM` otherwise.
    pub fn date(&self, text: &str) -> Option<String> {
        if let Some(c) = self.iso_date.captures(text) {
            let (month, day): (u32, u32) = (c[2].parse().ok()?, c[3].parse().ok()?);
            if valid_day_month(day, month) {
                return Some(c[0].to_string());
            }
        }
        for c in self.day_month.captures_iter(text) {
            let (day, month): (u32, u32) = (c[1].parse().ok()?, c[2].parse().ok()?);
            if !valid_day_month(day, month) {
                continue;
            }
            return Some(match c.get(3) {
                Some(year) => format!("{}-{:02}-{:02}", year.as_str(), month, day),
                None => format!("{:02}-{:02}", day, month),
            });
        }
        None
    }

    fn category(&self, content: &str) -> Option<String> {
        self.categories
            .iter()
            .find(|(_, re)| re.is_match(content))
            .map(|(name, _)| name.clone())
    }

    fn moment(&self, text: &str) -> Moment {
        Moment {
            patient_name: self.patient_name(text),
            date: self.date(text),
            time: self.time(text),
        }
    }
}

impl std::fmt::Debug for EntityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityExtractor")
            .field("categories", &self.categories.len())
            .finish_non_exhaustive()
    }
}

fn identifier(moment: Moment) -> Option<AppointmentIdentifier> {
    let id = AppointmentIdentifier {
        patient_name: moment.patient_name,
        date: moment.date,
        time: moment.time,
    };
    (!id.is_empty()).then_some(id)
}

fn valid_day_month(day: u32, month: u32) -> bool {
    (1..=31).contains(&day) && (1..=12).contains(&month)
}

fn build(pattern: &str, table: &str) -> Result<Regex, ReflexError> {
    Regex::new(pattern).map_err(|source| ReflexError::InvalidPattern {
        table: table.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}
