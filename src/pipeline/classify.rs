use std::sync::LazyLock;

use regex::Regex;

use super::ollama::LlmGenerate;
use super::parser::parse_classification;
use super::prompt::INTENT_SYSTEM_PROMPT;
use super::types::{Classification, ExtractedSlots, Intent};
use super::LlmError;
use crate::models::IntentKind;

/// Turns a raw message into an intent plus extracted field values.
pub trait Classifier {
    fn classify(&self, message: &str) -> Result<Classification, LlmError>;
}

/// Classifier backed by a language model prompted for strict JSON.
pub struct LlmClassifier<'a, G: LlmGenerate> {
    llm: &'a G,
}

impl<'a, G: LlmGenerate> LlmClassifier<'a, G> {
    pub fn new(llm: &'a G) -> Self {
        Self { llm }
    }
}

impl<G: LlmGenerate> Classifier for LlmClassifier<'_, G> {
    fn classify(&self, message: &str) -> Result<Classification, LlmError> {
        let reply = self.llm.generate(INTENT_SYSTEM_PROMPT, message)?;
        Ok(parse_classification(&reply))
    }
}

/// Deterministic offline classifier: keyword intent detection plus regex field extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, message: &str) -> Result<Classification, LlmError> {
        Ok(classify_by_keywords(message))
    }
}

const BOOKING_KEYWORDS: &[&str] = &["book", "appointment", "schedule", "see a doctor", "see dr"];
const UPDATE_KEYWORDS: &[&str] = &[
    "update",
    "add a note",
    "add note",
    "add to",
    "record that",
    "note that",
    "log that",
];
const HISTORY_KEYWORDS: &[&str] = &[
    "history",
    "show records",
    "show the records",
    "past records",
    "previous records",
    "records for",
    "previous visits",
];
const MEDICAL_KEYWORDS: &[&str] = &[
    "symptom",
    "treatment",
    "treat ",
    "what is",
    "what are",
    "side effect",
    "causes of",
    "diagnos",
    "medication for",
    "prevent",
];

/// Specialty spellings mapped to the canonical practitioner specialty.
const SPECIALTIES: &[(&str, &str)] = &[
    ("cardiolog", "Cardiology"),
    ("dermatolog", "Dermatology"),
    ("general medicine", "General Medicine"),
    ("general practitioner", "General Medicine"),
    ("endocrinolog", "Endocrinology"),
];

static PATIENT_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:for|patient)\s+(?:patient\s+)?([A-Z][a-zA-Z'-]+)").unwrap()
});

static PATIENT_POSSESSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z-]+)'s\s+(?:record|records|chart|file|history|notes)\b").unwrap()
});

static DOCTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:Dr\.?|Doctor)\s*([A-Z][a-zA-Z'-]+)").unwrap());

static DATE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(today|tomorrow|(?:next\s+|this\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)|\d{4}-\d{2}-\d{2})\b",
    )
    .unwrap()
});

static TIME_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(morning|afternoon|evening)\b").unwrap());

/// Checked in order; the first capture wins.
static TOPIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bsymptoms?\s+of\s+([^?.!,]+)",
        r"(?i)\btreatments?\s+(?:for|of)\s+([^?.!,]+)",
        r"(?i)\bcauses?\s+of\s+([^?.!,]+)",
        r"(?i)\bside\s+effects?\s+of\s+([^?.!,]+)",
        r"(?i)\b(?:because of|regarding|about)\s+(?:my\s+|a\s+|an\s+|the\s+)?([^?.!,]+)",
        r"(?i)\bwhat\s+(?:is|are)\s+(?:a\s+|an\s+|the\s+)?([^?.!,]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Words that look like names to the capitalisation heuristics but are not patients.
const NOT_A_NAME: &[&str] = &["Dr", "Doctor", "Patient", "Monday", "Tuesday", "Wednesday",
    "Thursday", "Friday", "Saturday", "Sunday", "Today", "Tomorrow"];

pub fn classify_by_keywords(message: &str) -> Classification {
    let lower = message.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let kind = if contains_any(BOOKING_KEYWORDS) {
        IntentKind::BookAppointment
    } else if contains_any(UPDATE_KEYWORDS) {
        IntentKind::UpdateRecords
    } else if contains_any(HISTORY_KEYWORDS) {
        IntentKind::RetrieveHistory
    } else if contains_any(MEDICAL_KEYWORDS) {
        IntentKind::MedicalInfo
    } else {
        IntentKind::General
    };

    let slots = extract_slots(message, &lower);
    let confidence = if kind == IntentKind::General { 0.3 } else { 0.6 };
    tracing::debug!(intent = %kind, "Keyword classification");

    Classification::new(Intent::from_parts(kind, slots), confidence)
}

fn extract_slots(message: &str, lower: &str) -> ExtractedSlots {
    let patient_name = PATIENT_FOR
        .captures_iter(message)
        .chain(PATIENT_POSSESSIVE.captures_iter(message))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .find(|name| !NOT_A_NAME.contains(name))
        .map(str::to_string);

    let doctor = DOCTOR
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let specialty = SPECIALTIES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, canonical)| canonical.to_string());

    let date_hint = DATE_HINT
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let time_hint = TIME_HINT
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase());

    let topic = TOPIC_PATTERNS
        .iter()
        .find_map(|re| re.captures(message).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());

    ExtractedSlots {
        patient_name,
        doctor,
        specialty,
        date_hint,
        time_hint,
        topic,
    }
}
