use crate::db::{repository, DatabaseError};
use crate::models::IntentKind;
use crate::pipeline::PatientRequest;

use super::{patient_or_default, ActionOutcome, ActionPayload, HandlerContext, MSG_NO_RECORDS};

/// Most recent records first, at most `ctx.history_limit`.
pub fn handle_history(
    ctx: &HandlerContext<'_>,
    req: &PatientRequest,
) -> Result<ActionOutcome, DatabaseError> {
    let patient = patient_or_default(req.patient_name.as_deref());
    let records = repository::get_patient_records(ctx.conn, &patient, ctx.history_limit)?;

    if records.is_empty() {
        return Ok(ActionOutcome::failed(
            IntentKind::RetrieveHistory,
            ActionPayload::NoRecords { patient },
            MSG_NO_RECORDS,
        ));
    }

    tracing::debug!(count = records.len(), "Loaded patient history");
    Ok(ActionOutcome::succeeded(
        IntentKind::RetrieveHistory,
        ActionPayload::History { patient, records },
    ))
}
