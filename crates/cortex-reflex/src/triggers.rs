//! Escalation triggers: phrasing the local classifier must not resolve alone.

use cortex_core::types::EscalationReason;
use regex::Regex;

use crate::error::ReflexError;
use crate::matcher::compile;
use crate::tables::TriggerTables;

/// Compiled trigger detectors, tested in a fixed order.
#[derive(Debug)]
pub struct EscalationTriggers {
    detectors: Vec<(EscalationReason, Vec<Regex>)>,
}

impl EscalationTriggers {
    pub fn new(tables: &TriggerTables) -> Result<Self, ReflexError> {
        let groups = [
            (
                EscalationReason::MultiIntentDetected,
                &tables.multi_intent,
                "triggers.multi_intent",
            ),
            (
                EscalationReason::NeedsContext,
                &tables.context,
                "triggers.context",
            ),
            (
                EscalationReason::RelativeTime,
                &tables.relative_time,
                "triggers.relative_time",
            ),
        ];

        let mut detectors = Vec::with_capacity(groups.len());
        for (reason, patterns, name) in groups {
            let compiled = patterns
                .iter()
                .map(|p| compile(p, name))
                .collect::<Result<Vec<_>, _>>()?;
            detectors.push((reason, compiled));
        }
        Ok(Self { detectors })
    }

    /// First trigger that fires: multi-intent, then context, then relative
    /// time.
    pub fn detect(&self, text: &str) -> Option<EscalationReason> {
        self.detectors
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
            .map(|(reason, _)| *reason)
    }
}

/// The part of an utterance that carries the command.
///
/// Dictated text after a colon ("Notitie: ...") is content, not command.
/// Colons inside clock times (`14:30`) do not split.
pub fn command_head(text: &str) -> &str {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        let digit_before = i > 0 && bytes[i - 1].is_ascii_digit();
        let digit_after = bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit());
        if !(digit_before && digit_after) {
            return &text[..i];
        }
    }
    text
}

/// Dictated text after the command colon, if any.
pub fn command_tail(text: &str) -> Option<&str> {
    let head = command_head(text);
    if head.len() == text.len() {
        return None;
    }
    let tail = text[head.len() + 1..].trim();
    (!tail.is_empty()).then_some(tail)
}
