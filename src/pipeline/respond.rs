use chrono::NaiveDate;

use super::ollama::LlmGenerate;
use super::prompt::{build_response_prompt, RESPONSE_SYSTEM_PROMPT};
use super::types::{ContextRetrieved, RetrievedContext};
use super::LlmError;
use crate::handlers::{ActionOutcome, ActionPayload};
use crate::models::{IntentKind, SentimentLabel};

/// Produces the single final text from everything the pipeline accumulated.
pub trait Responder {
    fn respond(&self, state: &ContextRetrieved) -> Result<String, LlmError>;
}

pub struct LlmResponder<'a, G: LlmGenerate> {
    llm: &'a G,
}

impl<'a, G: LlmGenerate> LlmResponder<'a, G> {
    pub fn new(llm: &'a G) -> Self {
        Self { llm }
    }
}

impl<G: LlmGenerate> Responder for LlmResponder<'_, G> {
    fn respond(&self, state: &ContextRetrieved) -> Result<String, LlmError> {
        let prompt = build_response_prompt(state);
        self.llm.generate(RESPONSE_SYSTEM_PROMPT, &prompt)
    }
}

/// Deterministic offline responder: fixed wording per outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateResponder;

const EMPATHY: &str = "I'm sorry you're dealing with this. I'll help as quickly as I can.";

const EMERGENCY_NOTICE: &str = "If you are experiencing chest pain, severe breathlessness or \
fainting, please call emergency services now.";

const EDUCATIONAL_DISCLAIMER: &str =
    "This is general information, not a diagnosis. Please discuss any concerns with your doctor.";

const GENERAL_HELP: &str = "I can book appointments, add notes to a patient's record, show a \
patient's history, or look up general medical information. What would you like to do?";

const EMERGENCY_CUES: &[&str] = &[
    "chest pain",
    "breathless",
    "can't breathe",
    "cannot breathe",
    "shortness of breath",
    "fainted",
    "fainting",
    "unconscious",
];

/// Characters of record content shown per history line.
const HISTORY_PREVIEW_CHARS: usize = 160;

impl Responder for TemplateResponder {
    fn respond(&self, state: &ContextRetrieved) -> Result<String, LlmError> {
        let mut parts = Vec::new();
        if state.sentiment().label == SentimentLabel::Negative {
            parts.push(EMPATHY.to_string());
        }
        parts.push(describe_outcome(state.outcome(), &state.context));
        if mentions_emergency(state.message()) {
            parts.push(EMERGENCY_NOTICE.to_string());
        }
        Ok(parts.join("\n\n"))
    }
}

fn describe_outcome(outcome: &ActionOutcome, context: &RetrievedContext) -> String {
    match &outcome.payload {
        ActionPayload::Booked {
            patient,
            appointment,
            doctor,
            day,
        } => format!(
            "Booked {patient} with {} on {} from {} to {} ({}).",
            doctor.name,
            long_date(*day),
            appointment.start.format("%H:%M"),
            appointment.end.format("%H:%M"),
            appointment.reason,
        ),
        ActionPayload::NoPractitioner { patient } => format!(
            "I couldn't book an appointment for {patient}: no practitioners available. \
             The practitioner list may need to be seeded first."
        ),
        ActionPayload::NoSlots { doctor, day, window } => format!(
            "I couldn't book with {} on {}: no slots available between {:02}:00 and {:02}:00. \
             Try another day or time of day.",
            doctor.name,
            long_date(*day),
            window.start_hour,
            window.end_hour,
        ),
        ActionPayload::SlotTaken {
            doctor,
            day,
            attempts,
        } => format!(
            "I couldn't book with {} on {}: slot no longer available after {attempts} attempts. \
             Please try again.",
            doctor.name,
            long_date(*day),
        ),
        ActionPayload::BookingRejected { doctor, day, reason } => format!(
            "I couldn't book with {} on {}: {reason}.",
            doctor.name,
            long_date(*day),
        ),
        ActionPayload::RecordAdded { patient, .. } => {
            format!("Added a note to {patient}'s record.")
        }
        ActionPayload::History { patient, records } => {
            let mut text = format!("Records for {patient} (most recent first):");
            for record in records {
                let preview: String = record.content.chars().take(HISTORY_PREVIEW_CHARS).collect();
                text.push_str(&format!(
                    "\n- {} [{}] {}",
                    record.created_at.format("%Y-%m-%d"),
                    record.record_type,
                    preview.replace('\n', " "),
                ));
            }
            text
        }
        ActionPayload::NoRecords { patient } => format!("No records found for {patient}."),
        ActionPayload::Topic { topic } if outcome.action == IntentKind::MedicalInfo => {
            describe_medical_answer(topic, context)
        }
        ActionPayload::Topic { .. } => GENERAL_HELP.to_string(),
    }
}

fn describe_medical_answer(topic: &str, context: &RetrievedContext) -> String {
    let body = match context {
        RetrievedContext::Passages(_) => {
            format!("Here is reference material on {topic}:\n\n{}", context.render())
        }
        RetrievedContext::Unavailable(reason) => format!(
            "The knowledge base is unavailable right now ({reason}), so I can't look up {topic}."
        ),
        RetrievedContext::NoneFound | RetrievedContext::NotNeeded => {
            format!("I couldn't find reference material on {topic}.")
        }
    };
    format!("{body}\n\n{EDUCATIONAL_DISCLAIMER}")
}

fn long_date(day: NaiveDate) -> String {
    day.format("%A %-d %B %Y").to_string()
}

fn mentions_emergency(message: &str) -> bool {
    let lower = message.to_lowercase();
    EMERGENCY_CUES.iter().any(|cue| lower.contains(cue))
}
