//! Lenient parsing of model output into classification and sentiment values.
//!
//! Models wrap JSON in code fences or prose and sometimes return lists where a
//! string was asked for. Parsing never fails: unusable output becomes a
//! raw-text carrier with neutral defaults.

use serde::Deserialize;
use serde_json::Value;

use super::types::{Classification, ExtractedSlots, Intent, Sentiment};
use crate::models::{IntentKind, SentimentLabel};

/// Locate the outermost JSON object in a model reply.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[derive(Deserialize)]
struct RawClassification {
    intent: Option<String>,
    confidence: Option<Value>,
    #[serde(default)]
    extracted: Option<RawExtracted>,
}

#[derive(Deserialize, Default)]
struct RawExtracted {
    patient_name: Option<Value>,
    doctor: Option<Value>,
    specialty: Option<Value>,
    date_hint: Option<Value>,
    time_hint: Option<Value>,
    topic: Option<Value>,
    #[serde(rename = "symptoms/topic")]
    symptoms_topic: Option<Value>,
    symptoms: Option<Value>,
}

impl RawExtracted {
    fn into_slots(self) -> ExtractedSlots {
        ExtractedSlots {
            patient_name: text_value(self.patient_name),
            doctor: text_value(self.doctor),
            specialty: text_value(self.specialty),
            date_hint: text_value(self.date_hint),
            time_hint: text_value(self.time_hint),
            topic: text_value(self.symptoms_topic)
                .or_else(|| text_value(self.topic))
                .or_else(|| text_value(self.symptoms)),
        }
    }
}

/// Parse a classifier reply. Unparseable replies become `Classification::fallback`.
pub fn parse_classification(response: &str) -> Classification {
    let parsed = extract_json_object(response)
        .and_then(|json| serde_json::from_str::<RawClassification>(json).ok());

    let Some(raw) = parsed else {
        tracing::warn!(chars = response.len(), "Classifier reply is not JSON, degrading to general");
        return Classification::fallback(Some(response.to_string()));
    };

    let kind = raw
        .intent
        .as_deref()
        .map(IntentKind::from_label)
        .unwrap_or(IntentKind::General);
    let slots = raw.extracted.unwrap_or_default().into_slots();
    let confidence = raw.confidence.as_ref().and_then(number_value).unwrap_or(0.0);

    Classification::new(Intent::from_parts(kind, slots), confidence as f32)
}

#[derive(Deserialize)]
struct RawSentiment {
    sentiment: Option<String>,
    intensity: Option<Value>,
    #[serde(default)]
    emotions: Option<Value>,
    #[serde(default)]
    notes: Option<Value>,
}

/// Parse a sentiment reply. Unparseable replies are neutral with the text kept in `raw`.
pub fn parse_sentiment(response: &str) -> Sentiment {
    let parsed = extract_json_object(response)
        .and_then(|json| serde_json::from_str::<RawSentiment>(json).ok());

    let Some(raw) = parsed else {
        tracing::warn!(chars = response.len(), "Sentiment reply is not JSON, assuming neutral");
        return Sentiment {
            raw: Some(response.to_string()),
            ..Sentiment::neutral()
        };
    };

    let label = raw
        .sentiment
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .and_then(|s| s.parse::<SentimentLabel>().ok())
        .unwrap_or(SentimentLabel::Neutral);

    let emotions = match raw.emotions {
        Some(Value::Array(items)) => items.into_iter().filter_map(|v| text_value(Some(v))).collect(),
        other => text_value(other).into_iter().collect(),
    };

    Sentiment {
        label,
        intensity: raw
            .intensity
            .as_ref()
            .and_then(number_value)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0) as f32,
        emotions,
        notes: text_value(raw.notes).unwrap_or_default(),
        raw: None,
    }
}

/// Strings are trimmed, lists of strings joined, numbers stringified; empties are `None`.
fn text_value(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::trim))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty() && !text.eq_ignore_ascii_case("null")).then_some(text)
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let reply = r#"{"intent": "book_appointment", "confidence": 0.92,
            "extracted": {"patient_name": "Anjali", "doctor": "Dr. Smith",
                          "date_hint": "next Monday", "time_hint": "morning"}}"#;
        let c = parse_classification(reply);
        assert_eq!(c.intent.kind(), IntentKind::BookAppointment);
        assert!((c.confidence - 0.92).abs() < 1e-6);
        assert!(c.raw.is_none());
        match c.intent {
            Intent::BookAppointment(req) => {
                assert_eq!(req.patient_name.as_deref(), Some("Anjali"));
                assert_eq!(req.time_hint.as_deref(), Some("morning"));
                assert!(req.reason.is_none());
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let reply = "Sure! Here is the classification:\n```json\n{\"intent\": \"retrieve_history\", \"confidence\": \"0.8\", \"extracted\": {\"patient_name\": \"Ramesh\"}}\n```\nLet me know.";
        let c = parse_classification(reply);
        assert_eq!(c.intent.kind(), IntentKind::RetrieveHistory);
        assert!((c.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn slash_topic_key_preferred() {
        let reply = r#"{"intent": "medical_info", "confidence": 1,
            "extracted": {"symptoms/topic": ["cough", "fever"], "topic": "ignored"}}"#;
        let c = parse_classification(reply);
        assert_eq!(c.intent.topic(), Some("cough, fever"));
    }

    #[test]
    fn nulls_and_blank_strings_are_absent() {
        let reply = r#"{"intent": "update_records", "extracted": {"patient_name": "  ", "doctor": null}}"#;
        let c = parse_classification(reply);
        assert_eq!(c.confidence, 0.0);
        match c.intent {
            Intent::UpdateRecords(req) => assert!(req.patient_name.is_none()),
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn unknown_intent_label_is_general() {
        let c = parse_classification(r#"{"intent": "cancel_everything", "confidence": 0.4}"#);
        assert_eq!(c.intent.kind(), IntentKind::General);
        assert!(c.raw.is_none());
    }

    #[test]
    fn non_json_degrades_to_raw_carrier() {
        let c = parse_classification("I think they want to book something.");
        assert_eq!(c.intent.kind(), IntentKind::General);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.raw.as_deref(), Some("I think they want to book something."));
    }

    #[test]
    fn sentiment_parsed_and_clamped() {
        let s = parse_sentiment(
            r#"{"sentiment": "Negative", "intensity": 1.4, "emotions": ["anxious", "worried"], "notes": "fears surgery"}"#,
        );
        assert_eq!(s.label, SentimentLabel::Negative);
        assert_eq!(s.intensity, 1.0);
        assert_eq!(s.emotions, vec!["anxious", "worried"]);
        assert_eq!(s.notes, "fears surgery");
    }

    #[test]
    fn sentiment_garbage_is_neutral() {
        let s = parse_sentiment("positive vibes only");
        assert_eq!(s.label, SentimentLabel::Neutral);
        assert_eq!(s.raw.as_deref(), Some("positive vibes only"));
    }

    #[test]
    fn extract_object_requires_braces() {
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
        assert_eq!(extract_json_object("x {\"a\":1} y"), Some("{\"a\":1}"));
    }
}
