//! Platform reserve endpoint for the admin layer.

use api_types::reserve::{ReserveHealth, ReserveStatusView};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

fn health_view(health: engine::ReserveHealth) -> ReserveHealth {
    match health {
        engine::ReserveHealth::Healthy => ReserveHealth::Healthy,
        engine::ReserveHealth::Warning => ReserveHealth::Warning,
        engine::ReserveHealth::Critical => ReserveHealth::Critical,
    }
}

pub async fn get_status(
    State(state): State<ServerState>,
) -> Result<Json<ReserveStatusView>, ServerError> {
    let status = state.engine.check_platform_reserve().await?;

    Ok(Json(ReserveStatusView {
        current_reserve_cents: status.current_reserve_cents,
        processor_available_cents: status.processor_available_cents,
        minimum_required_cents: status.minimum_required_cents,
        drift_cents: status.drift_cents,
        health: health_view(status.health),
        should_block_transfers: status.should_block_transfers,
        message: status.message,
    }))
}
