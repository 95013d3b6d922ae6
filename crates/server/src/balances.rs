//! Balance read endpoints.

use api_types::{Currency, balance::BalanceView};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};
use engine::WalletOwner;

pub async fn platform(
    State(state): State<ServerState>,
) -> Result<Json<BalanceView>, ServerError> {
    let wallet_id = state.engine.get_or_create_wallet(WalletOwner::Platform).await?;
    let balance_cents = state.engine.wallet_balance(wallet_id).await?;

    Ok(Json(BalanceView {
        wallet_id,
        balance_cents,
        currency: Currency::Usd,
    }))
}
