//! Credit-limit endpoints: risk scan and pre-booking checks.

use api_types::credit::{CreditCheckRequest, CreditCheckView, CreditRiskView, CreditStatus};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn status_view(status: engine::CreditStatus) -> Option<CreditStatus> {
    match status {
        engine::CreditStatus::Ok => None,
        engine::CreditStatus::Warning => Some(CreditStatus::Warning),
        engine::CreditStatus::Urgent => Some(CreditStatus::Urgent),
        engine::CreditStatus::Exceeded => Some(CreditStatus::Exceeded),
    }
}

/// Students whose classification is not ok, most severe first. Consulted by
/// the scheduling component and the dunning screens.
pub async fn risk(
    State(state): State<ServerState>,
) -> Result<Json<Vec<CreditRiskView>>, ServerError> {
    let rows = state.engine.students_near_credit_limit().await?;

    let views = rows
        .into_iter()
        .filter_map(|row| {
            status_view(row.status).map(|status| CreditRiskView {
                student_id: row.student_id,
                balance_cents: row.balance_cents,
                limit_cents: row.limit_cents,
                percent_used: row.percent_used,
                status,
            })
        })
        .collect();

    Ok(Json(views))
}

/// Can this student afford a proposed charge? Read-only.
pub async fn check(
    State(state): State<ServerState>,
    Path(student_id): Path<Uuid>,
    Json(payload): Json<CreditCheckRequest>,
) -> Result<Json<CreditCheckView>, ServerError> {
    let check = state
        .engine
        .check_credit_limit(student_id, payload.proposed_charge_cents)
        .await?;

    Ok(Json(CreditCheckView {
        allowed: check.allowed,
        current_balance_cents: check.current_balance_cents,
        new_balance_cents: check.new_balance_cents,
        limit_cents: check.limit_cents,
        warning: check.warning,
        blocked_reason: check.blocked_reason,
    }))
}
