//! Shared vocabulary of the command pipeline.
//!
//! Intent kinds, the entity bag, classification results, action chains and
//! nudge suggestions. Every other crate in the workspace speaks these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minimum local confidence for a result to be accepted without escalation.
pub const CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Minimum gap between the best and second-best intent for a local result
/// to count as unambiguous.
pub const AMBIGUITY_THRESHOLD: f64 = 0.15;

// =============================================================================
// Enums
// =============================================================================

/// Classified category of a clinician utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Write a daily report note for a patient.
    Note,
    /// Look up a patient record.
    PatientSearch,
    /// Start the shift handover.
    Handover,
    /// Show the agenda.
    ScheduleView,
    CreateAppointment,
    CancelAppointment,
    RescheduleAppointment,
    /// Terminal fallback when nothing could be determined.
    Unknown,
}

impl IntentKind {
    /// Every intent kind, in declaration order.
    pub const ALL: [IntentKind; 8] = [
        IntentKind::Note,
        IntentKind::PatientSearch,
        IntentKind::Handover,
        IntentKind::ScheduleView,
        IntentKind::CreateAppointment,
        IntentKind::CancelAppointment,
        IntentKind::RescheduleAppointment,
        IntentKind::Unknown,
    ];

    /// Wire name used in serialized payloads and model prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Note => "note",
            IntentKind::PatientSearch => "patient_search",
            IntentKind::Handover => "handover",
            IntentKind::ScheduleView => "schedule_view",
            IntentKind::CreateAppointment => "create_appointment",
            IntentKind::CancelAppointment => "cancel_appointment",
            IntentKind::RescheduleAppointment => "reschedule_appointment",
            IntentKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown intent kind: {}", s))
    }
}

/// Why a local classification was handed to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    LowConfidence,
    Ambiguous,
    MultiIntentDetected,
    NeedsContext,
    RelativeTime,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationReason::LowConfidence => write!(f, "low_confidence"),
            EscalationReason::Ambiguous => write!(f, "ambiguous"),
            EscalationReason::MultiIntentDetected => write!(f, "multi_intent_detected"),
            EscalationReason::NeedsContext => write!(f, "needs_context"),
            EscalationReason::RelativeTime => write!(f, "relative_time"),
        }
    }
}

/// Lifecycle of a single action inside a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Confirming,
    Executing,
    Success,
    Failed,
    Skipped,
}

impl ActionStatus {
    /// Success, failed and skipped are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Success | ActionStatus::Failed | ActionStatus::Skipped
        )
    }

    /// Confirming and executing actions block promotion of the next one.
    pub fn is_active(&self) -> bool {
        matches!(self, ActionStatus::Confirming | ActionStatus::Executing)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Pending => write!(f, "pending"),
            ActionStatus::Confirming => write!(f, "confirming"),
            ActionStatus::Executing => write!(f, "executing"),
            ActionStatus::Success => write!(f, "success"),
            ActionStatus::Failed => write!(f, "failed"),
            ActionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Aggregate status of a chain, derived from its actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Executing,
    Completed,
    Partial,
    Failed,
}

impl ChainStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChainStatus::Executing)
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Executing => write!(f, "executing"),
            ChainStatus::Completed => write!(f, "completed"),
            ChainStatus::Partial => write!(f, "partial"),
            ChainStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Which layer produced a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSource {
    Local,
    Ai,
}

impl fmt::Display for ChainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainSource::Local => write!(f, "local"),
            ChainSource::Ai => write!(f, "ai"),
        }
    }
}

/// Working shift of the clinician issuing the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Early,
    Late,
    Night,
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::Early => write!(f, "early"),
            Shift::Late => write!(f, "late"),
            Shift::Night => write!(f, "night"),
        }
    }
}

impl std::str::FromStr for Shift {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "early" | "vroeg" => Ok(Shift::Early),
            "late" | "laat" => Ok(Shift::Late),
            "night" | "nacht" => Ok(Shift::Night),
            _ => Err(format!("Unknown shift: {}", s)),
        }
    }
}

// =============================================================================
// Entity bag
// =============================================================================

/// Names of the fields of [`Entities`], used by rule conditions and redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    PatientName,
    PatientId,
    Content,
    Category,
    Date,
    Time,
    NewDate,
    NewTime,
    AppointmentType,
}

/// Target appointment, identified by patient and moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppointmentIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl AppointmentIdentifier {
    pub fn is_empty(&self) -> bool {
        is_blank(&self.patient_name) && is_blank(&self.date) && is_blank(&self.time)
    }
}

/// Structured values extracted from an utterance. Every field is optional.
///
/// Unknown keys are rejected on deserialization so a model reply cannot smuggle
/// unrecognised fields downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// ISO date (`2025-03-14`) or a day-month fragment (`14-03`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Clock time, `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<AppointmentIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<String>,
}

impl Entities {
    /// Look up a field by key. Empty strings are reported as absent.
    pub fn get(&self, key: EntityKey) -> Option<&str> {
        let value = match key {
            EntityKey::PatientName => &self.patient_name,
            EntityKey::PatientId => &self.patient_id,
            EntityKey::Content => &self.content,
            EntityKey::Category => &self.category,
            EntityKey::Date => &self.date,
            EntityKey::Time => &self.time,
            EntityKey::NewDate => &self.new_date,
            EntityKey::NewTime => &self.new_time,
            EntityKey::AppointmentType => &self.appointment_type,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Set a field by key.
    pub fn set(&mut self, key: EntityKey, value: Option<String>) {
        let slot = match key {
            EntityKey::PatientName => &mut self.patient_name,
            EntityKey::PatientId => &mut self.patient_id,
            EntityKey::Content => &mut self.content,
            EntityKey::Category => &mut self.category,
            EntityKey::Date => &mut self.date,
            EntityKey::Time => &mut self.time,
            EntityKey::NewDate => &mut self.new_date,
            EntityKey::NewTime => &mut self.new_time,
            EntityKey::AppointmentType => &mut self.appointment_type,
        };
        *slot = value;
    }

    /// True when no field carries a non-empty value.
    pub fn is_empty(&self) -> bool {
        ALL_ENTITY_KEYS.iter().all(|k| self.get(*k).is_none())
            && self.identifier.as_ref().is_none_or(|i| i.is_empty())
    }

    /// Merge `overrides` onto a copy of `self`; present override fields win.
    pub fn overlay(&self, overrides: &Entities) -> Entities {
        let mut merged = self.clone();
        for key in ALL_ENTITY_KEYS {
            if let Some(v) = overrides.get(key) {
                merged.set(key, Some(v.to_string()));
            }
        }
        if let Some(ref id) = overrides.identifier {
            if !id.is_empty() {
                merged.identifier = Some(id.clone());
            }
        }
        merged
    }

    /// Best available patient reference: explicit name, then the appointment
    /// identifier, then the record id.
    pub fn patient_reference(&self) -> Option<&str> {
        self.get(EntityKey::PatientName)
            .or_else(|| {
                self.identifier
                    .as_ref()
                    .and_then(|i| i.patient_name.as_deref())
                    .filter(|v| !v.trim().is_empty())
            })
            .or_else(|| self.get(EntityKey::PatientId))
    }
}

/// Every scalar entity key, in declaration order.
pub const ALL_ENTITY_KEYS: [EntityKey; 9] = [
    EntityKey::PatientName,
    EntityKey::PatientId,
    EntityKey::Content,
    EntityKey::Category,
    EntityKey::Date,
    EntityKey::Time,
    EntityKey::NewDate,
    EntityKey::NewTime,
    EntityKey::AppointmentType,
];

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

// =============================================================================
// Classification
// =============================================================================

/// Output of the local pattern classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalClassificationResult {
    pub intent: IntentKind,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_intent: Option<IntentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    #[serde(default)]
    pub entities: Entities,
    pub processing_time_ms: f64,
    pub should_escalate_to_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
}

/// Session state the orchestrator may use to resolve references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_patient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,
    /// Earlier utterances in this session, oldest first.
    #[serde(default)]
    pub recent_utterances: Vec<String>,
}

// =============================================================================
// Chains
// =============================================================================

/// Failure detail attached to a failed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub message: String,
    pub recoverable: bool,
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAction {
    pub id: Uuid,
    pub intent: IntentKind,
    pub entities: Entities,
    pub confidence: f64,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl IntentAction {
    pub fn new(intent: IntentKind, entities: Entities, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            entities,
            confidence,
            status: ActionStatus::Pending,
            confirmation_message: None,
            error: None,
            completed_at: None,
        }
    }
}

/// Provenance and timing of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub source: ChainSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_reasoning: Option<String>,
    pub processing_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// Ordered actions derived from one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentChain {
    pub id: Uuid,
    pub actions: Vec<IntentAction>,
    pub raw_input: String,
    pub status: ChainStatus,
    pub metadata: ChainMetadata,
}

impl IntentChain {
    /// Create a chain whose first action is awaiting confirmation and the
    /// rest are pending.
    pub fn new(
        raw_input: impl Into<String>,
        mut actions: Vec<IntentAction>,
        metadata: ChainMetadata,
    ) -> Self {
        for (i, action) in actions.iter_mut().enumerate() {
            action.status = if i == 0 {
                ActionStatus::Confirming
            } else {
                ActionStatus::Pending
            };
        }
        Self {
            id: Uuid::new_v4(),
            actions,
            raw_input: raw_input.into(),
            status: ChainStatus::Executing,
            metadata,
        }
    }

    pub fn action(&self, id: Uuid) -> Option<&IntentAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn action_mut(&mut self, id: Uuid) -> Option<&mut IntentAction> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// The action currently awaiting confirmation or executing, if any.
    pub fn current(&self) -> Option<&IntentAction> {
        self.actions.iter().find(|a| a.status.is_active())
    }
}

// =============================================================================
// Nudges
// =============================================================================

/// Ranking of a follow-up suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, lowest first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Lifecycle of a suggestion as decided by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeStatus {
    Pending,
    Accepted,
    Dismissed,
}

/// The completed action that caused a rule to fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeTrigger {
    pub action_id: Uuid,
    pub intent: IntentKind,
    pub entities: Entities,
}

/// What the suggestion proposes to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub rule_id: String,
    pub intent: IntentKind,
    pub message: String,
    pub entities: Entities,
}

/// A proactive follow-up proposal, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeSuggestion {
    pub id: Uuid,
    pub trigger: NudgeTrigger,
    pub suggestion: SuggestedAction,
    pub status: NudgeStatus,
    pub priority: Priority,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NudgeSuggestion {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Tests
// =============================================================================
