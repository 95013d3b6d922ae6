//! Payout enqueue endpoint for upstream domain-event producers.

use api_types::transfer::{TransferEnqueue, TransferEnqueued};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

/// Durably enqueue an instructor payout for a posted journal.
///
/// Idempotent per `(journal, instructor)`: duplicate deliveries of the
/// triggering event land on the same outbox row.
pub async fn enqueue(
    State(state): State<ServerState>,
    Json(payload): Json<TransferEnqueue>,
) -> Result<Json<TransferEnqueued>, ServerError> {
    let outbox_id = state
        .engine
        .enqueue_instructor_transfer(
            payload.instructor_id,
            payload.amount_cents,
            payload.flight_session_id,
            payload.journal_id,
            payload.is_instant_payout,
        )
        .await?;

    Ok(Json(TransferEnqueued { outbox_id }))
}
