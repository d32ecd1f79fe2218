use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record type written by the chat record-update task.
pub const RECORD_TYPE_NOTE: &str = "Note";
/// Record type for reports imported by seeding.
pub const RECORD_TYPE_IMPORTED: &str = "ImportedReport";
/// Provenance tag for notes appended from a chat message.
pub const SOURCE_CHAT_UPDATE: &str = "chat_update";

/// An append-only clinical note or imported report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub created_at: NaiveDateTime,
    pub record_type: String,
    pub content: String,
    pub source: String,
}
