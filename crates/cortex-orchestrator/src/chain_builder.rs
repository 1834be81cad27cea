//! Turning classifications and model replies into intent chains.

use chrono::Utc;
use cortex_core::types::{
    ChainMetadata, ChainSource, Entities, EntityKey, IntentAction, IntentChain, IntentKind,
    LocalClassificationResult,
};

use crate::schema::ModelReply;

/// Dutch question shown to the clinician before an action runs.
pub fn confirmation_message(intent: IntentKind, entities: &Entities) -> String {
    let patient = entities.patient_reference();
    match intent {
        IntentKind::Note => match patient {
            Some(p) => format!("Notitie aanmaken voor {}?", p),
            None => "Notitie aanmaken?".to_string(),
        },
        IntentKind::PatientSearch => match patient {
            Some(p) => format!("Dossier van {} openen?", p),
            None => "Patiënt zoeken?".to_string(),
        },
        IntentKind::Handover => "Dienstoverdracht starten?".to_string(),
        IntentKind::ScheduleView => match entities.get(EntityKey::Date) {
            Some(d) => format!("Agenda van {} tonen?", d),
            None => "Agenda tonen?".to_string(),
        },
        IntentKind::CreateAppointment => {
            let mut msg = "Afspraak maken".to_string();
            if let Some(t) = entities.get(EntityKey::AppointmentType) {
                msg = format!("Afspraak ({}) maken", t);
            }
            if let Some(p) = patient {
                msg.push_str(&format!(" voor {}", p));
            }
            msg.push_str(&moment(
                entities.get(EntityKey::Date),
                entities.get(EntityKey::Time),
            ));
            msg.push('?');
            msg
        }
        IntentKind::CancelAppointment => {
            let (date, time) = identifier_moment(entities);
            let mut msg = "Afspraak".to_string();
            if let Some(p) = patient {
                msg.push_str(&format!(" van {}", p));
            }
            msg.push_str(&moment(date, time));
            msg.push_str(" annuleren?");
            msg
        }
        IntentKind::RescheduleAppointment => {
            let (date, time) = identifier_moment(entities);
            let mut msg = "Afspraak".to_string();
            if let Some(p) = patient {
                msg.push_str(&format!(" van {}", p));
            }
            msg.push_str(&moment(date, time));
            msg.push_str(" verplaatsen");
            match (
                entities.get(EntityKey::NewDate),
                entities.get(EntityKey::NewTime),
            ) {
                (Some(d), Some(t)) => msg.push_str(&format!(" naar {} om {}", d, t)),
                (Some(v), None) | (None, Some(v)) => msg.push_str(&format!(" naar {}", v)),
                (None, None) => {}
            }
            msg.push('?');
            msg
        }
        IntentKind::Unknown => "Opdracht niet begrepen. Wilt u het anders formuleren?".to_string(),
    }
}

fn identifier_moment(entities: &Entities) -> (Option<&str>, Option<&str>) {
    fn pick(v: Option<&String>) -> Option<&str> {
        v.map(String::as_str).filter(|s| !s.trim().is_empty())
    }

    let id = entities.identifier.as_ref();
    (
        pick(id.and_then(|i| i.date.as_ref())).or_else(|| entities.get(EntityKey::Date)),
        pick(id.and_then(|i| i.time.as_ref())).or_else(|| entities.get(EntityKey::Time)),
    )
}

/// " op <date> om <time>", either part optional.
fn moment(date: Option<&str>, time: Option<&str>) -> String {
    let mut s = String::new();
    if let Some(d) = date {
        s.push_str(&format!(" op {}", d));
    }
    if let Some(t) = time {
        s.push_str(&format!(" om {}", t));
    }
    s
}

fn action(intent: IntentKind, entities: Entities, confidence: f64) -> IntentAction {
    let mut action = IntentAction::new(intent, entities, confidence);
    action.confirmation_message = Some(confirmation_message(intent, &action.entities));
    action
}

/// One-action chain for a result the reflex layer accepted.
pub fn local_chain(raw_input: &str, result: &LocalClassificationResult) -> IntentChain {
    IntentChain::new(
        raw_input,
        vec![action(result.intent, result.entities.clone(), result.confidence)],
        ChainMetadata {
            source: ChainSource::Local,
            ai_reasoning: None,
            processing_time_ms: result.processing_time_ms,
            created_at: Utc::now(),
        },
    )
}

/// Chain from a validated model reply, actions in reply order.
pub fn ai_chain(raw_input: &str, reply: ModelReply, processing_time_ms: f64) -> IntentChain {
    let actions = reply
        .actions
        .into_iter()
        .map(|a| action(a.intent, a.entities, a.confidence))
        .collect();
    IntentChain::new(
        raw_input,
        actions,
        ChainMetadata {
            source: ChainSource::Ai,
            ai_reasoning: reply.reasoning,
            processing_time_ms,
            created_at: Utc::now(),
        },
    )
}

/// Single `unknown` action at confidence 0, used whenever the model call or
/// its validation fails.
pub fn fallback_chain(raw_input: &str, processing_time_ms: f64) -> IntentChain {
    IntentChain::new(
        raw_input,
        vec![action(IntentKind::Unknown, Entities::default(), 0.0)],
        ChainMetadata {
            source: ChainSource::Ai,
            ai_reasoning: None,
            processing_time_ms,
            created_at: Utc::now(),
        },
    )
}
