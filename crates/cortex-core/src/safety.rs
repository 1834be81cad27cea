//! Redaction of personal identifiers before text reaches the log sink.
//!
//! Clinician utterances routinely contain patient names, phone numbers,
//! citizen service numbers (BSN) and dates of birth. The [`SafetyGate`]
//! scrubs free text and entity bags so telemetry can be shipped outside the
//! care environment.

use crate::config::TelemetryConfig;
use crate::types::{Entities, EntityKey};

/// Replacement for patient names and record ids in entity bags.
pub const PATIENT_TOKEN: &str = "[PATIENT]";

/// Type of identifier detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiType {
    Email,
    Phone,
    Bsn,
    Date,
}

impl PiiType {
    pub fn token(&self) -> &'static str {
        match self {
            PiiType::Email => "[EMAIL_REDACTED]",
            PiiType::Phone => "[PHONE_REDACTED]",
            PiiType::Bsn => "[BSN_REDACTED]",
            PiiType::Date => "[DATE_REDACTED]",
        }
    }
}

/// Outcome of checking a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyDecision {
    /// Nothing to redact.
    Allow,
    /// Identifiers were found; the scrubbed text is provided.
    Redacted {
        text: String,
        redaction_count: usize,
    },
}

/// Scrubs personal identifiers from text and entity bags.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    config: TelemetryConfig,
}

impl SafetyGate {
    pub fn new(config: TelemetryConfig) -> Self {
        Self { config }
    }

    /// Whether any redaction is applied at all (off in development).
    pub fn is_active(&self) -> bool {
        self.config.redaction_active()
    }

    /// Check text and return a decision.
    pub fn check(&self, content: &str) -> SafetyDecision {
        if !self.is_active() {
            return SafetyDecision::Allow;
        }

        let mut redacted = content.to_string();
        let mut total = 0usize;

        // Dates first so their digits are not mistaken for phone fragments.
        if self.config.date_redaction {
            let (text, count) = redact_dates(&redacted);
            redacted = text;
            total += count;
        }

        if self.config.email_redaction {
            let (text, count) = redact_emails(&redacted);
            redacted = text;
            total += count;
        }

        if self.config.bsn_redaction || self.config.phone_redaction {
            let (text, count) = redact_numbers(
                &redacted,
                self.config.bsn_redaction,
                self.config.phone_redaction,
            );
            redacted = text;
            total += count;
        }

        if total > 0 {
            SafetyDecision::Redacted {
                text: redacted,
                redaction_count: total,
            }
        } else {
            SafetyDecision::Allow
        }
    }

    /// Convenience: return the scrubbed text.
    pub fn redact(&self, content: &str) -> String {
        match self.check(content) {
            SafetyDecision::Allow => content.to_string(),
            SafetyDecision::Redacted { text, .. } => text,
        }
    }

    /// Copy of `entities` fit for logging: patient references replaced,
    /// free-text content scrubbed.
    pub fn sanitize_entities(&self, entities: &Entities) -> Entities {
        if !self.is_active() {
            return entities.clone();
        }
        let mut clean = entities.clone();
        if self.config.patient_redaction {
            for key in [EntityKey::PatientName, EntityKey::PatientId] {
                if clean.get(key).is_some() {
                    clean.set(key, Some(PATIENT_TOKEN.to_string()));
                }
            }
            if let Some(ref mut id) = clean.identifier {
                if id.patient_name.is_some() {
                    id.patient_name = Some(PATIENT_TOKEN.to_string());
                }
            }
        }
        if let Some(content) = entities.get(EntityKey::Content) {
            clean.content = Some(self.redact(content));
        }
        clean
    }
}

/// Validate a citizen service number with the eleven-test.
///
/// Weights 9..2 apply to the first eight digits and -1 to the last; the
/// weighted sum must be a positive multiple of 11.
pub fn elfproef(digits: &[u32]) -> bool {
    if digits.len() != 9 {
        return false;
    }
    let sum: i64 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let weight = if i == 8 { -1 } else { 9 - i as i64 };
            weight * d as i64
        })
        .sum();
    sum > 0 && sum % 11 == 0
}

/// Replace `dd-mm-yyyy` and `dd/mm/yyyy` dates.
fn redact_dates(text: &str) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(text.len());
    let mut count = 0;
    let mut i = 0;

    while i < len {
        let boundary_before = i == 0 || !chars[i - 1].is_ascii_alphanumeric();
        if boundary_before && chars[i].is_ascii_digit() {
            if let Some(end) = match_date(&chars, i) {
                let boundary_after = end == len || !chars[end].is_ascii_alphanumeric();
                if boundary_after {
                    result.push_str(PiiType::Date.token());
                    count += 1;
                    i = end;
                    continue;
                }
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    (result, count)
}

/// Match `d{1,2}[-/]d{1,2}[-/]d{4}` at `pos`, returning the end index.
fn match_date(chars: &[char], pos: usize) -> Option<usize> {
    let mut i = pos;
    for (min, max) in [(1, 2), (1, 2)] {
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() && i - start < max {
            i += 1;
        }
        if i - start < min || i >= chars.len() || !(chars[i] == '-' || chars[i] == '/') {
            return None;
        }
        i += 1;
    }
    let start = i;
    while i < chars.len() && chars[i].is_ascii_digit() && i - start < 4 {
        i += 1;
    }
    if i - start == 4 && (i == chars.len() || !chars[i].is_ascii_digit()) {
        Some(i)
    } else {
        None
    }
}

/// Replace email addresses while preserving surrounding whitespace.
fn redact_emails(text: &str) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(text.len());
    let mut count = 0;
    let mut i = 0;

    while i < len {
        if chars[i] == '@' {
            let mut local_start = i;
            while local_start > 0 && is_email_local_char(chars[local_start - 1]) {
                local_start -= 1;
            }

            let mut domain_end = i + 1;
            while domain_end < len && is_email_domain_char(chars[domain_end]) {
                domain_end += 1;
            }
            while domain_end > i + 1
                && (chars[domain_end - 1] == '.' || chars[domain_end - 1] == '-')
            {
                domain_end -= 1;
            }
            let has_dot = chars[i + 1..domain_end].contains(&'.');

            let local_len = i - local_start;
            let domain_len = domain_end - (i + 1);

            if local_len > 0 && domain_len >= 3 && has_dot {
                // The local part was already copied; drop it again.
                let pushed: usize = chars[local_start..i].iter().map(|c| c.len_utf8()).sum();
                result.truncate(result.len() - pushed);
                result.push_str(PiiType::Email.token());
                count += 1;
                i = domain_end;
                continue;
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    (result, count)
}

fn is_email_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '+' || c == '-' || c == '_'
}

fn is_email_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

/// Replace Dutch phone numbers and citizen service numbers.
///
/// A run is a `+` or digit followed by digits, where single spaces or dashes
/// may separate digit groups. Runs glued to letters are left alone.
///
/// - BSN: exactly nine digits, no separators, passing [`elfproef`].
/// - Phone: ten digits starting with `0` (`06-12345678`, `020 1234567`), or
///   `+31` followed by nine digits (`+31 6 12345678`).
fn redact_numbers(text: &str, bsn: bool, phone: bool) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(text.len());
    let mut count = 0;
    let mut i = 0;

    while i < len {
        let starts_run = chars[i].is_ascii_digit()
            || (chars[i] == '+' && i + 1 < len && chars[i + 1].is_ascii_digit());
        let boundary_before = i == 0 || !chars[i - 1].is_ascii_alphanumeric();

        if !(starts_run && boundary_before) {
            result.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        let plus = chars[i] == '+';
        if plus {
            i += 1;
        }
        let mut digits: Vec<u32> = Vec::new();
        let mut separated = false;
        while i < len {
            if let Some(d) = chars[i].to_digit(10) {
                digits.push(d);
                i += 1;
            } else if (chars[i] == ' ' || chars[i] == '-')
                && i + 1 < len
                && chars[i + 1].is_ascii_digit()
            {
                separated = true;
                i += 1;
            } else {
                break;
            }
        }

        let boundary_after = i == len || !chars[i].is_ascii_alphanumeric();
        let is_bsn = bsn && !plus && !separated && elfproef(&digits);
        let is_phone = phone
            && ((!plus && digits.len() == 10 && digits[0] == 0)
                || (plus && digits.len() == 11 && digits[0] == 3 && digits[1] == 1));

        if boundary_after && (is_bsn || is_phone) {
            let token = if is_bsn { PiiType::Bsn } else { PiiType::Phone };
            result.push_str(token.token());
            count += 1;
        } else {
            result.extend(&chars[start..i]);
        }
    }

    (result, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::types::AppointmentIdentifier;

    fn gate() -> SafetyGate {
        SafetyGate::new(TelemetryConfig::default())
    }

    #[test]
    fn test_elfproef_valid_and_invalid() {
        assert!(elfproef(&[1, 1, 1, 2, 2, 2, 3, 3, 3]));
        assert!(!elfproef(&[1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert!(!elfproef(&[0; 9]));
        assert!(!elfproef(&[1, 1, 1, 2, 2, 2, 3, 3]));
    }

    #[test]
    fn test_bsn_redacted() {
        let out = gate().redact("BSN 111222333 gecontroleerd");
        assert_eq!(out, "BSN [BSN_REDACTED] gecontroleerd");
    }

    #[test]
    fn test_nine_digits_failing_elfproef_kept() {
        let out = gate().redact("ordernummer 123456789");
        assert_eq!(out, "ordernummer 123456789");
    }

    #[test]
    fn test_mobile_number_formats() {
        let g = gate();
        assert_eq!(g.redact("bel 06-12345678"), "bel [PHONE_REDACTED]");
        assert_eq!(g.redact("bel 0612345678."), "bel [PHONE_REDACTED].");
        assert_eq!(g.redact("bel +31 6 12345678"), "bel [PHONE_REDACTED]");
        assert_eq!(g.redact("bel +31612345678"), "bel [PHONE_REDACTED]");
    }

    #[test]
    fn test_landline_number() {
        assert_eq!(
            gate().redact("huisarts 020-1234567 bellen"),
            "huisarts [PHONE_REDACTED] bellen"
        );
    }

    #[test]
    fn test_short_numbers_untouched() {
        let g = gate();
        assert_eq!(g.redact("kamer 12 om 14:30"), "kamer 12 om 14:30");
        assert_eq!(g.redact("bloeddruk 120/80"), "bloeddruk 120/80");
    }

    #[test]
    fn test_date_of_birth_redacted() {
        let g = gate();
        assert_eq!(
            g.redact("geboren 03-04-1941 in Utrecht"),
            "geboren [DATE_REDACTED] in Utrecht"
        );
        assert_eq!(g.redact("geb. 3/4/1941"), "geb. [DATE_REDACTED]");
        // Day-month fragments without a year stay.
        assert_eq!(g.redact("afspraak 14-03"), "afspraak 14-03");
    }

    #[test]
    fn test_email_redacted() {
        assert_eq!(
            gate().redact("mail naar j.jansen@zorg.example.nl graag"),
            "mail naar [EMAIL_REDACTED] graag"
        );
    }

    #[test]
    fn test_check_reports_count() {
        match gate().check("06-12345678 en 111222333") {
            SafetyDecision::Redacted {
                text,
                redaction_count,
            } => {
                assert_eq!(redaction_count, 2);
                assert_eq!(text, "[PHONE_REDACTED] en [BSN_REDACTED]");
            }
            SafetyDecision::Allow => panic!("expected redaction"),
        }
    }

    #[test]
    fn test_clean_text_allowed() {
        assert_eq!(
            gate().check("wond aan linkerbeen verzorgd"),
            SafetyDecision::Allow
        );
    }

    #[test]
    fn test_development_skips_redaction() {
        let config = TelemetryConfig {
            environment: Environment::Development,
            ..TelemetryConfig::default()
        };
        let g = SafetyGate::new(config);
        assert!(!g.is_active());
        assert_eq!(g.redact("bel 06-12345678"), "bel 06-12345678");
    }

    #[test]
    fn test_disabled_detector_keeps_value() {
        let config = TelemetryConfig {
            phone_redaction: false,
            ..TelemetryConfig::default()
        };
        let g = SafetyGate::new(config);
        assert_eq!(g.redact("bel 06-12345678"), "bel 06-12345678");
        assert_eq!(g.redact("111222333"), "[BSN_REDACTED]");
    }

    #[test]
    fn test_sanitize_entities_replaces_patient_references() {
        let entities = Entities {
            patient_name: Some("mevrouw Jansen".to_string()),
            patient_id: Some("P-1042".to_string()),
            content: Some("dochter belt op 06-12345678".to_string()),
            time: Some("14:30".to_string()),
            identifier: Some(AppointmentIdentifier {
                patient_name: Some("Jansen".to_string()),
                date: Some("2025-03-14".to_string()),
                time: None,
            }),
            ..Default::default()
        };
        let clean = gate().sanitize_entities(&entities);
        assert_eq!(clean.patient_name.as_deref(), Some(PATIENT_TOKEN));
        assert_eq!(clean.patient_id.as_deref(), Some(PATIENT_TOKEN));
        assert_eq!(
            clean.content.as_deref(),
            Some("dochter belt op [PHONE_REDACTED]")
        );
        assert_eq!(clean.time.as_deref(), Some("14:30"));
        let id = clean.identifier.unwrap();
        assert_eq!(id.patient_name.as_deref(), Some(PATIENT_TOKEN));
        assert_eq!(id.date.as_deref(), Some("2025-03-14"));
    }

    #[test]
    fn test_sanitize_entities_leaves_absent_fields_absent() {
        let clean = gate().sanitize_entities(&Entities::default());
        assert!(clean.is_empty());
    }
}
