use crate::models::IntentKind;
use crate::pipeline::TopicRequest;

use super::{ActionOutcome, ActionPayload};

pub const MEDICAL_TOPIC_FALLBACK: &str = "medical question";
pub const GENERAL_TOPIC_FALLBACK: &str = "general question";

/// No storage access: echo the subject for the retrieval and response stages.
pub fn handle_medical_info(req: &TopicRequest) -> ActionOutcome {
    ActionOutcome::succeeded(
        IntentKind::MedicalInfo,
        ActionPayload::Topic {
            topic: topic_or(req, MEDICAL_TOPIC_FALLBACK),
        },
    )
}

pub fn handle_general(req: &TopicRequest) -> ActionOutcome {
    ActionOutcome::succeeded(
        IntentKind::General,
        ActionPayload::Topic {
            topic: topic_or(req, GENERAL_TOPIC_FALLBACK),
        },
    )
}

fn topic_or(req: &TopicRequest, fallback: &str) -> String {
    req.topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_of(outcome: &ActionOutcome) -> &str {
        match &outcome.payload {
            ActionPayload::Topic { topic } => topic,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn echoes_extracted_topic() {
        let outcome = handle_medical_info(&TopicRequest {
            topic: Some(" hypertension ".into()),
        });
        assert!(outcome.success);
        assert_eq!(outcome.action, IntentKind::MedicalInfo);
        assert_eq!(topic_of(&outcome), "hypertension");
    }

    #[test]
    fn falls_back_to_generic_labels() {
        assert_eq!(
            topic_of(&handle_medical_info(&TopicRequest::default())),
            "medical question"
        );
        assert_eq!(
            topic_of(&handle_general(&TopicRequest::default())),
            "general question"
        );
    }
}
