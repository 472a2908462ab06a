use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::middleware::AtmUser;
use crate::models::AtmUser as AtmAccount;
use crate::services::ledger::{self, EntryKind, LedgerError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/atm/account", get(account))
        .route("/atm/withdraw", post(withdraw))
        .route("/atm/deposit", post(deposit))
        .route("/atm/transfer", post(transfer))
        .route("/atm/history", get(history))
}

fn ledger_error(e: LedgerError) -> (StatusCode, String) {
    match e {
        LedgerError::NonPositiveAmount | LedgerError::InsufficientFunds => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        LedgerError::Storage(err) => {
            tracing::error!("atm ledger storage error: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "ATM is temporarily unavailable".to_string())
        }
        LedgerError::Corrupt(err) => {
            tracing::error!("atm ledger corrupt entry: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "ATM is temporarily unavailable".to_string())
        }
    }
}

/* ---------- ACCOUNT ---------- */

#[derive(Debug, Serialize)]
struct AccountResponse {
    account_number: String,
    holder_name: String,
    balance: f64,
}

// GET /api/atm/account
async fn account(
    State(state): State<Arc<AppState>>,
    user: AtmUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let balance = ledger::load_balance(&state.redis, user.id, user.opening_balance)
        .await
        .map_err(ledger_error)?;

    Ok(Json(AccountResponse {
        account_number: user.account_number,
        holder_name: user.holder_name,
        balance,
    }))
}

/* ---------- MUTATIONS ---------- */

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: f64,
}

#[derive(Debug, Serialize)]
struct MutationResponse {
    balance: f64,
    entry: ledger::LedgerEntry,
}

async fn mutate(
    state: &AppState,
    user: &AtmUser,
    kind: EntryKind,
    amount: f64,
    description: String,
) -> Result<MutationResponse, LedgerError> {
    let balance = ledger::load_balance(&state.redis, user.id, user.opening_balance).await?;

    // Rejection happens here, before anything is written.
    let new_balance = ledger::apply(kind, amount, balance)?;

    let entry = ledger::make_entry(kind, amount, description, new_balance);
    ledger::store_balance(&state.redis, user.id, new_balance).await?;
    ledger::record_entry(&state.redis, user.id, &entry).await?;

    Ok(MutationResponse { balance: new_balance, entry })
}

// POST /api/atm/withdraw
async fn withdraw(
    State(state): State<Arc<AppState>>,
    user: AtmUser,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let response = mutate(&state, &user, EntryKind::Withdraw, req.amount, "Cash withdrawal".to_string())
        .await
        .map_err(ledger_error)?;
    Ok(Json(response))
}

// POST /api/atm/deposit
async fn deposit(
    State(state): State<Arc<AppState>>,
    user: AtmUser,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let response = mutate(&state, &user, EntryKind::Deposit, req.amount, "Cash deposit".to_string())
        .await
        .map_err(ledger_error)?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    amount: f64,
    recipient_account: String,
}

// POST /api/atm/transfer
async fn transfer(
    State(state): State<Arc<AppState>>,
    user: AtmUser,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let recipient_account = req.recipient_account.trim();
    if recipient_account.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a recipient account".to_string()));
    }
    if recipient_account == user.account_number {
        return Err((StatusCode::BAD_REQUEST, "Cannot transfer to your own account".to_string()));
    }

    let recipient = sqlx::query_as::<_, AtmAccount>(
        "SELECT id, account_number, pin, holder_name, opening_balance
         FROM atm_users WHERE account_number = $1",
    )
    .bind(recipient_account)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("transfer recipient lookup error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Transfer failed".to_string())
    })?
    .ok_or((StatusCode::NOT_FOUND, "Recipient account not found".to_string()))?;

    // Debit first; an over-balance amount is rejected before any write.
    let response = mutate(
        &state,
        &user,
        EntryKind::Transfer,
        req.amount,
        format!("Transfer to {}", recipient.holder_name),
    )
    .await
    .map_err(ledger_error)?;

    // Credit the recipient's stored balance.
    let recipient_balance = ledger::load_balance(&state.redis, recipient.id, recipient.opening_balance)
        .await
        .map_err(ledger_error)?;
    ledger::store_balance(&state.redis, recipient.id, recipient_balance + req.amount)
        .await
        .map_err(ledger_error)?;

    Ok(Json(response))
}

/* ---------- HISTORY ---------- */

// GET /api/atm/history - the 50 most recent entries, newest first
async fn history(
    State(state): State<Arc<AppState>>,
    user: AtmUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = ledger::load_history(&state.redis, user.id)
        .await
        .map_err(ledger_error)?;
    Ok(Json(entries))
}
