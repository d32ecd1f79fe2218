use crate::db::{repository, DatabaseError};
use crate::models::{IntentKind, RECORD_TYPE_NOTE, SOURCE_CHAT_UPDATE};
use crate::pipeline::PatientRequest;

use super::{patient_or_default, ActionOutcome, ActionPayload, HandlerContext};

/// Append the whole message as a note on the patient's record.
pub fn handle_record_update(
    ctx: &HandlerContext<'_>,
    req: &PatientRequest,
    message: &str,
) -> Result<ActionOutcome, DatabaseError> {
    let patient = patient_or_default(req.patient_name.as_deref());
    let record = repository::insert_record(
        ctx.conn,
        &patient,
        RECORD_TYPE_NOTE,
        message,
        SOURCE_CHAT_UPDATE,
    )?;
    tracing::info!(record_id = %record.id, "Appended chat note");

    Ok(ActionOutcome::succeeded(
        IntentKind::UpdateRecords,
        ActionPayload::RecordAdded { patient, record },
    ))
}
