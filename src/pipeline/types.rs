use serde::{Deserialize, Serialize};

use crate::handlers::ActionOutcome;
use crate::models::{IntentKind, KnowledgeChunk, SentimentLabel};

/// Passage length cap when context is rendered for the responder.
pub const PASSAGE_CHAR_LIMIT: usize = 900;

pub const CONTEXT_NOT_NEEDED: &str = "(not needed)";
pub const CONTEXT_NONE_FOUND: &str = "(no relevant context found)";

/// Field values pulled out of the message by a classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedSlots {
    pub patient_name: Option<String>,
    pub doctor: Option<String>,
    pub specialty: Option<String>,
    pub date_hint: Option<String>,
    pub time_hint: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_name: Option<String>,
    pub doctor: Option<String>,
    pub specialty: Option<String>,
    pub date_hint: Option<String>,
    pub time_hint: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRequest {
    pub patient_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub topic: Option<String>,
}

/// A classified request. Each task category carries only the fields its handler reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "extracted", rename_all = "snake_case")]
pub enum Intent {
    BookAppointment(BookingRequest),
    UpdateRecords(PatientRequest),
    RetrieveHistory(PatientRequest),
    MedicalInfo(TopicRequest),
    General(TopicRequest),
}

impl Intent {
    pub fn from_parts(kind: IntentKind, slots: ExtractedSlots) -> Self {
        match kind {
            IntentKind::BookAppointment => Self::BookAppointment(BookingRequest {
                patient_name: slots.patient_name,
                doctor: slots.doctor,
                specialty: slots.specialty,
                date_hint: slots.date_hint,
                time_hint: slots.time_hint,
                reason: slots.topic,
            }),
            IntentKind::UpdateRecords => Self::UpdateRecords(PatientRequest {
                patient_name: slots.patient_name,
            }),
            IntentKind::RetrieveHistory => Self::RetrieveHistory(PatientRequest {
                patient_name: slots.patient_name,
            }),
            IntentKind::MedicalInfo => Self::MedicalInfo(TopicRequest { topic: slots.topic }),
            IntentKind::General => Self::General(TopicRequest { topic: slots.topic }),
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Self::BookAppointment(_) => IntentKind::BookAppointment,
            Self::UpdateRecords(_) => IntentKind::UpdateRecords,
            Self::RetrieveHistory(_) => IntentKind::RetrieveHistory,
            Self::MedicalInfo(_) => IntentKind::MedicalInfo,
            Self::General(_) => IntentKind::General,
        }
    }

    /// Subject for retrieval, when the intent is informational.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::MedicalInfo(req) | Self::General(req) => {
                req.topic.as_deref().map(str::trim).filter(|t| !t.is_empty())
            }
            _ => None,
        }
    }
}

/// Classifier output. `raw` holds the collaborator's text when it could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    #[serde(flatten)]
    pub intent: Intent,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Classification {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            raw: None,
        }
    }

    /// General intent with zero confidence, carrying whatever text the collaborator produced.
    pub fn fallback(raw: Option<String>) -> Self {
        Self {
            intent: Intent::General(TopicRequest::default()),
            confidence: 0.0,
            raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(rename = "sentiment")]
    pub label: SentimentLabel,
    pub intensity: f32,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            intensity: 0.0,
            emotions: Vec::new(),
            notes: String::new(),
            raw: None,
        }
    }
}

/// What the retrieval stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RetrievedContext {
    /// Intent was not informational; the stage passed through.
    NotNeeded,
    Passages(Vec<KnowledgeChunk>),
    NoneFound,
    /// Retriever failed; the reason is kept for the responder and the log.
    Unavailable(String),
}

impl RetrievedContext {
    /// Text handed to the responder: `[n] passage` blocks separated by blank lines, or a sentinel.
    pub fn render(&self) -> String {
        match self {
            Self::NotNeeded => CONTEXT_NOT_NEEDED.to_string(),
            Self::NoneFound => CONTEXT_NONE_FOUND.to_string(),
            Self::Unavailable(reason) => format!("(knowledge base unavailable: {reason})"),
            Self::Passages(chunks) => chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let text: String = chunk.content.chars().take(PASSAGE_CHAR_LIMIT).collect();
                    format!("[{}] {}", i + 1, text)
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classified,
    SentimentScored,
    ActionDispatched,
    ContextRetrieved,
    Responded,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Classified,
        Stage::SentimentScored,
        Stage::ActionDispatched,
        Stage::ContextRetrieved,
        Stage::Responded,
    ];
}

/// How a stage finished. Aborting failures never produce a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Visited but inert for this intent.
    Skipped,
    /// A collaborator failed and a fallback value was used.
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl StageReport {
    fn new(stage: Stage, status: StageStatus) -> Self {
        Self { stage, status }
    }
}

// Stage records. Each one owns its predecessor, so a later stage can read
// everything produced before it and nothing is mutated after the fact.

#[derive(Debug, Clone)]
pub struct Classified {
    pub message: String,
    pub classification: Classification,
    pub status: StageStatus,
}

#[derive(Debug, Clone)]
pub struct SentimentScored {
    pub prior: Classified,
    pub sentiment: Sentiment,
    pub status: StageStatus,
}

#[derive(Debug, Clone)]
pub struct ActionDispatched {
    pub prior: SentimentScored,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone)]
pub struct ContextRetrieved {
    pub prior: ActionDispatched,
    pub context: RetrievedContext,
}

impl ContextRetrieved {
    pub fn status(&self) -> StageStatus {
        match &self.context {
            RetrievedContext::NotNeeded => StageStatus::Skipped,
            RetrievedContext::Unavailable(reason) => StageStatus::Degraded(reason.clone()),
            RetrievedContext::Passages(_) | RetrievedContext::NoneFound => StageStatus::Completed,
        }
    }

    pub fn message(&self) -> &str {
        &self.prior.prior.prior.message
    }

    pub fn classification(&self) -> &Classification {
        &self.prior.prior.prior.classification
    }

    pub fn sentiment(&self) -> &Sentiment {
        &self.prior.prior.sentiment
    }

    pub fn outcome(&self) -> &ActionOutcome {
        &self.prior.outcome
    }
}

#[derive(Debug, Clone)]
pub struct Responded {
    pub prior: ContextRetrieved,
    pub response: String,
}

impl Responded {
    pub fn into_run(self) -> PipelineRun {
        let Responded { prior, response } = self;
        let retrieval_status = prior.status();
        let ContextRetrieved { prior, context } = prior;
        let ActionDispatched { prior, outcome } = prior;
        let SentimentScored {
            prior,
            sentiment,
            status: sentiment_status,
        } = prior;
        let Classified {
            message,
            classification,
            status: classify_status,
        } = prior;

        let stages = vec![
            StageReport::new(Stage::Classified, classify_status),
            StageReport::new(Stage::SentimentScored, sentiment_status),
            StageReport::new(Stage::ActionDispatched, StageStatus::Completed),
            StageReport::new(Stage::ContextRetrieved, retrieval_status),
            StageReport::new(Stage::Responded, StageStatus::Completed),
        ];

        PipelineRun {
            message,
            classification,
            sentiment,
            outcome,
            context,
            response,
            stages,
        }
    }
}

/// Final state of one pipeline run, every intermediate output included.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub message: String,
    pub classification: Classification,
    pub sentiment: Sentiment,
    pub outcome: ActionOutcome,
    pub context: RetrievedContext,
    pub response: String,
    pub stages: Vec<StageReport>,
}

impl PipelineRun {
    pub fn intent(&self) -> IntentKind {
        self.classification.intent.kind()
    }

    /// Stages whose collaborator failed and fell back.
    pub fn degraded_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|r| matches!(r.status, StageStatus::Degraded(_)))
            .map(|r| r.stage)
            .collect()
    }
}
