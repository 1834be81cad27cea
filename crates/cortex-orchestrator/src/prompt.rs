//! Instruction template for the language model.

use chrono::NaiveDate;
use cortex_core::types::{IntentKind, SessionContext, Shift};

/// One-line Dutch description of what an intent means and which entities
/// to extract for it.
fn intent_rule(intent: IntentKind) -> &'static str {
    match intent {
        IntentKind::Note => {
            "notitie of rapportage vastleggen. Entities: patient_name, content (de gedicteerde tekst), category"
        }
        IntentKind::PatientSearch => "patiëntdossier zoeken of openen. Entities: patient_name of patient_id",
        IntentKind::Handover => "dienstoverdracht starten. Geen entities",
        IntentKind::ScheduleView => "agenda of planning tonen. Entities: date (optioneel)",
        IntentKind::CreateAppointment => {
            "nieuwe afspraak maken. Entities: patient_name, date, time, appointment_type"
        }
        IntentKind::CancelAppointment => {
            "afspraak annuleren. Entities: identifier { patient_name, date, time }"
        }
        IntentKind::RescheduleAppointment => {
            "afspraak verplaatsen. Entities: identifier { patient_name, date, time }, new_date, new_time"
        }
        IntentKind::Unknown => "de opdracht is niet te bepalen. Geen entities",
    }
}

fn shift_label(shift: Shift) -> &'static str {
    match shift {
        Shift::Early => "vroege dienst",
        Shift::Late => "late dienst",
        Shift::Night => "nachtdienst",
    }
}

/// Fixed system instruction: the intent catalogue, the entity rules and the
/// reply format.
pub fn system_prompt() -> String {
    let mut prompt = String::from(
        "Je bent de opdrachtinterpreter van een elektronisch cliëntendossier voor de zorg. \
         Zet de opdracht van de zorgverlener om in een of meer gestructureerde acties.\n\n\
         Toegestane intents:\n",
    );
    for intent in IntentKind::ALL {
        prompt.push_str(&format!("- {}: {}\n", intent, intent_rule(intent)));
    }
    prompt.push_str(
        "\nRegels:\n\
         - Datums als YYYY-MM-DD, tijden als HH:MM (24-uurs). Reken relatieve datums \
           (morgen, volgende week, donderdag) om vanaf de datum van vandaag.\n\
         - Verwijzingen als 'hem', 'haar' of 'die patiënt' slaan op de actieve patiënt.\n\
         - Laat onbekende entities weg; verzin geen waarden.\n\
         - Meerdere opdrachten in één zin worden meerdere acties, in de genoemde volgorde.\n\
         - confidence is een getal tussen 0 en 1.\n\n\
         Antwoord uitsluitend met één JSON-object, zonder toelichting eromheen. Voor één actie:\n\
         {\"intent\": \"note\", \"confidence\": 0.92, \"entities\": {\"patient_name\": \"mevrouw Jansen\", \
         \"content\": \"wond verzorgd\"}, \"reasoning\": \"...\"}\n\
         Voor meerdere acties:\n\
         {\"actions\": [{\"intent\": \"cancel_appointment\", \"confidence\": 0.9, \"entities\": {...}}, \
         {\"intent\": \"create_appointment\", \"confidence\": 0.85, \"entities\": {...}}], \"reasoning\": \"...\"}\n",
    );
    prompt
}

/// User message: session context followed by the utterance.
pub fn user_prompt(
    utterance: &str,
    context: &SessionContext,
    today: NaiveDate,
    context_turns: usize,
) -> String {
    let mut prompt = format!("Datum van vandaag: {}\n", today.format("%Y-%m-%d (%A)"));
    if let Some(patient) = context.active_patient.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!("Actieve patiënt: {}\n", patient));
    }
    if let Some(shift) = context.shift {
        prompt.push_str(&format!("Dienst: {}\n", shift_label(shift)));
    }

    let skip = context.recent_utterances.len().saturating_sub(context_turns);
    let recent: Vec<&String> = context.recent_utterances.iter().skip(skip).collect();
    if !recent.is_empty() {
        prompt.push_str("Eerdere opdrachten:\n");
        for u in recent {
            prompt.push_str(&format!("- {}\n", u));
        }
    }

    prompt.push_str(&format!("\nOpdracht: {}", utterance.trim()));
    prompt
}
