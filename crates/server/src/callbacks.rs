//! Processor callback (webhook) endpoint.
//!
//! Settlement confirmations, settlement failures, disputes and account
//! updates arrive here asynchronously. Authenticity is a shared secret in
//! the `x-processor-secret` header; a bad or missing secret is rejected
//! before the body is even interpreted.

use api_types::callback::{CallbackReceived, ProcessorEvent};
use axum::{Json, extract::State};
use axum_extra::TypedHeader;

use crate::{
    ServerError,
    server::{ProcessorSecret, ServerState},
};

pub async fn receive(
    TypedHeader(secret): TypedHeader<ProcessorSecret>,
    State(state): State<ServerState>,
    Json(event): Json<ProcessorEvent>,
) -> Result<Json<CallbackReceived>, ServerError> {
    if secret.0 != state.callback_secret {
        return Err(ServerError::Unauthorized);
    }

    match &event {
        ProcessorEvent::TransferPaid { transfer_id } => {
            state.engine.transfer_paid(transfer_id).await?;
        }
        ProcessorEvent::TransferFailed {
            transfer_id,
            message,
        } => {
            state.engine.transfer_failed(transfer_id, message).await?;
        }
        ProcessorEvent::ChargeDisputeCreated {
            transfer_id,
            dispute_id,
            reason,
        } => {
            state
                .engine
                .dispute_created(transfer_id, dispute_id, reason)
                .await?;
        }
        ProcessorEvent::AccountUpdated {
            instructor_id,
            account_id,
            payouts_enabled,
        } => {
            state
                .engine
                .payout_account_updated(*instructor_id, account_id, *payouts_enabled)
                .await?;
        }
    }

    Ok(Json(CallbackReceived { received: true }))
}
