//! Alert endpoints: unacknowledged list and acknowledgement.

use api_types::alert::{AlertAcknowledge, AlertView};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

#[derive(Deserialize)]
pub struct AlertQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<AlertView>>, ServerError> {
    let alerts = state.engine.unacknowledged_alerts(query.limit).await?;

    let views = alerts
        .into_iter()
        .map(|alert| AlertView {
            id: alert.id,
            alert_type: alert.alert_type.as_str().to_string(),
            severity: alert.severity.as_str().to_string(),
            message: alert.message,
            platform_balance_cents: alert.platform_balance_cents,
            drift_cents: alert.drift_cents,
            threshold_cents: alert.threshold_cents,
            created_at: alert.created_at,
        })
        .collect();

    Ok(Json(views))
}

pub async fn acknowledge(
    State(state): State<ServerState>,
    Path(alert_id): Path<Uuid>,
    Json(payload): Json<AlertAcknowledge>,
) -> Result<Json<()>, ServerError> {
    state
        .engine
        .acknowledge_alert(alert_id, &payload.acknowledged_by, payload.notes.as_deref())
        .await?;
    Ok(Json(()))
}
