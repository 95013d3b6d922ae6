//! Ledger write and history endpoints.

use api_types::journal::{EntryView, JournalCreated, JournalNew};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::EntryDraft;

/// Post a balanced journal for a domain event.
///
/// Re-posting the same `(event_type, event_id)` returns the existing journal
/// id with a 200, matching the idempotent contract upstream producers rely
/// on.
pub async fn post_new(
    State(state): State<ServerState>,
    Json(payload): Json<JournalNew>,
) -> Result<Json<JournalCreated>, ServerError> {
    let drafts: Vec<EntryDraft> = payload
        .entries
        .into_iter()
        .map(|entry| EntryDraft {
            wallet_id: entry.wallet_id,
            amount_cents: entry.amount_cents,
            ref_type: entry.ref_type,
            description: entry.description,
            metadata: entry.metadata,
        })
        .collect();

    let journal_id = state
        .engine
        .post_journal(&payload.event_type, &payload.event_id, &drafts)
        .await?;

    Ok(Json(JournalCreated { journal_id }))
}

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

/// Transaction history for a wallet, newest first.
pub async fn wallet_entries(
    State(state): State<ServerState>,
    Path(wallet_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<EntryView>>, ServerError> {
    let rows = state
        .engine
        .wallet_ledger_entries(wallet_id, page.limit, page.offset)
        .await?;

    let views = rows
        .into_iter()
        .map(|(entry, journal)| EntryView {
            journal_id: entry.journal_id,
            wallet_id: entry.wallet_id,
            amount_cents: entry.amount_cents,
            ref_type: entry.ref_type,
            description: entry.description,
            event_type: journal.event_type,
            event_id: journal.event_id,
            created_at: journal.created_at,
        })
        .collect();

    Ok(Json(views))
}
