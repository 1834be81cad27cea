//! Caller-owned list of live suggestions.

use chrono::{DateTime, Utc};
use cortex_core::types::{IntentAction, NudgeStatus, NudgeSuggestion};
use tracing::debug;
use uuid::Uuid;

/// Live suggestions, highest priority first.
///
/// Accepting or dismissing a suggestion removes it and hands it back with
/// its final status; expired ones are dropped by
/// [`SuggestionQueue::purge_expired`].
#[derive(Debug, Default)]
pub struct SuggestionQueue {
    items: Vec<NudgeSuggestion>,
}

impl SuggestionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert behind every suggestion of equal or higher priority.
    pub fn push(&mut self, suggestion: NudgeSuggestion) {
        let rank = suggestion.priority.rank();
        let pos = self
            .items
            .iter()
            .position(|s| s.priority.rank() > rank)
            .unwrap_or(self.items.len());
        self.items.insert(pos, suggestion);
    }

    pub fn extend(&mut self, suggestions: impl IntoIterator<Item = NudgeSuggestion>) {
        for s in suggestions {
            self.push(s);
        }
    }

    /// Remove the suggestion and return it marked accepted.
    pub fn accept(&mut self, id: Uuid) -> Option<NudgeSuggestion> {
        self.take(id, NudgeStatus::Accepted)
    }

    /// Remove the suggestion and return it marked dismissed.
    pub fn dismiss(&mut self, id: Uuid) -> Option<NudgeSuggestion> {
        self.take(id, NudgeStatus::Dismissed)
    }

    /// Drop every suggestion expired at `now` and return them.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<NudgeSuggestion> {
        let (expired, live): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|s| s.is_expired(now));
        self.items = live;
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expired suggestions removed");
        }
        expired
    }

    pub fn active(&self) -> &[NudgeSuggestion] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn take(&mut self, id: Uuid, status: NudgeStatus) -> Option<NudgeSuggestion> {
        let pos = self.items.iter().position(|s| s.id == id)?;
        let mut suggestion = self.items.remove(pos);
        suggestion.status = status;
        Some(suggestion)
    }
}

/// The action an accepted suggestion proposes, ready to be loaded into a
/// chain.
pub fn suggested_action(suggestion: &NudgeSuggestion) -> IntentAction {
    IntentAction::new(
        suggestion.suggestion.intent,
        suggestion.suggestion.entities.clone(),
        1.0,
    )
}
