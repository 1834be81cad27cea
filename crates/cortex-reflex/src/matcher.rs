//! Weighted pattern matching per intent.

use cortex_core::types::IntentKind;
use regex::{Regex, RegexBuilder};

use crate::error::ReflexError;
use crate::tables::IntentPatterns;

/// Best match of one intent's pattern list against an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub intent: IntentKind,
    pub weight: f64,
    /// Source text of the pattern that produced the weight.
    pub pattern: String,
}

/// Scores an utterance for a single intent.
///
/// Implementations must be pure: the same text always yields the same score.
pub trait ScoredMatcher: Send + Sync {
    fn intent(&self) -> IntentKind;

    /// Highest-weight match, or `None` when nothing matches.
    fn best_match(&self, text: &str) -> Option<MatchScore>;
}

struct CompiledPattern {
    regex: Regex,
    weight: f64,
}

/// Matcher backed by an ordered list of case-insensitive regexes.
pub struct RegexMatcher {
    intent: IntentKind,
    patterns: Vec<CompiledPattern>,
}

impl RegexMatcher {
    /// Compile a table. Fails on the first invalid regex or out-of-range
    /// weight.
    pub fn new(table: &IntentPatterns) -> Result<Self, ReflexError> {
        let mut patterns = Vec::with_capacity(table.patterns.len());
        for p in &table.patterns {
            if !(p.weight > 0.0 && p.weight <= 1.0) {
                return Err(ReflexError::InvalidWeight {
                    pattern: p.pattern.clone(),
                    weight: p.weight,
                });
            }
            let regex = compile(&p.pattern, table.intent.as_str())?;
            patterns.push(CompiledPattern {
                regex,
                weight: p.weight,
            });
        }
        Ok(Self {
            intent: table.intent,
            patterns,
        })
    }
}

impl ScoredMatcher for RegexMatcher {
    fn intent(&self) -> IntentKind {
        self.intent
    }

    fn best_match(&self, text: &str) -> Option<MatchScore> {
        let mut best: Option<&CompiledPattern> = None;
        for p in &self.patterns {
            if !p.regex.is_match(text) {
                continue;
            }
            // Strictly greater: earlier patterns win ties.
            if best.is_none_or(|b| p.weight > b.weight) {
                best = Some(p);
            }
            if p.weight >= 1.0 {
                break;
            }
        }
        best.map(|p| MatchScore {
            intent: self.intent,
            weight: p.weight,
            pattern: p.regex.as_str().to_string(),
        })
    }
}

impl std::fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("intent", &self.intent)
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

/// Compile a table pattern case-insensitively.
pub(crate) fn compile(pattern: &str, table: &str) -> Result<Regex, ReflexError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ReflexError::InvalidPattern {
            table: table.to_string(),
            pattern: pattern.to_string(),
            source,
        })
}
