//! ATM ledger: per-user balance plus a bounded transaction history.
//!
//! The original app kept this state in the browser's local storage; here
//! the same two key shapes live in Redis - a JSON balance under
//! `atm:balance:{user}` and a newest-first JSON list under
//! `atm:history:{user}` trimmed to the 50 most recent entries. Balance
//! rules are pure functions so the arithmetic is testable without Redis.

use chrono::{NaiveDateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redis_client::RedisClient;

pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("storage error: {0}")]
    Storage(#[from] redis::RedisError),
    #[error("corrupt ledger entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Withdraw,
    Deposit,
    Transfer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: f64,
    pub timestamp: NaiveDateTime,
    pub description: String,
    pub balance_after: f64,
}

/* ---------- pure balance rules ---------- */

/// Apply one mutation to a balance. Withdrawals and transfers are
/// rejected before any state changes when they exceed the balance.
pub fn apply(kind: EntryKind, amount: f64, balance: f64) -> Result<f64, LedgerError> {
    if amount <= 0.0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    match kind {
        EntryKind::Deposit => Ok(balance + amount),
        EntryKind::Withdraw | EntryKind::Transfer => {
            if amount > balance {
                Err(LedgerError::InsufficientFunds)
            } else {
                Ok(balance - amount)
            }
        }
    }
}

pub fn make_entry(kind: EntryKind, amount: f64, description: String, balance_after: f64) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        kind,
        amount,
        timestamp: Utc::now().naive_utc(),
        description,
        balance_after,
    }
}

/* ---------- redis persistence ---------- */

fn balance_key(user_id: Uuid) -> String {
    format!("atm:balance:{}", user_id)
}

fn history_key(user_id: Uuid) -> String {
    format!("atm:history:{}", user_id)
}

/// Current balance, falling back to the seeded opening balance the first
/// time an account is touched.
pub async fn load_balance(redis: &RedisClient, user_id: Uuid, opening_balance: f64) -> Result<f64, LedgerError> {
    let mut conn = redis.conn();
    let stored: Option<f64> = conn.get(balance_key(user_id)).await?;
    Ok(stored.unwrap_or(opening_balance))
}

pub async fn store_balance(redis: &RedisClient, user_id: Uuid, balance: f64) -> Result<(), LedgerError> {
    let mut conn = redis.conn();
    let _: () = conn.set(balance_key(user_id), balance).await?;
    Ok(())
}

/// Most recent entries, newest first.
pub async fn load_history(redis: &RedisClient, user_id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut conn = redis.conn();
    let raw: Vec<String> = conn
        .lrange(history_key(user_id), 0, HISTORY_LIMIT as isize - 1)
        .await?;
    let mut entries = Vec::with_capacity(raw.len());
    for item in raw {
        entries.push(serde_json::from_str(&item)?);
    }
    Ok(entries)
}

/// Persist one entry at the head of the list and trim to the cap.
pub async fn record_entry(redis: &RedisClient, user_id: Uuid, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let serialized = serde_json::to_string(entry)?;
    let key = history_key(user_id);
    let mut conn = redis.conn();
    let _: () = redis::pipe()
        .lpush(&key, serialized)
        .ltrim(&key, 0, HISTORY_LIMIT as isize - 1)
        .query_async(&mut conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EntryKind, amount: f64, balance_after: f64) -> LedgerEntry {
        make_entry(kind, amount, "test".to_string(), balance_after)
    }

    #[test]
    fn withdraw_reduces_balance() {
        assert_eq!(apply(EntryKind::Withdraw, 30.0, 100.0).unwrap(), 70.0);
    }

    #[test]
    fn deposit_increases_balance() {
        assert_eq!(apply(EntryKind::Deposit, 50.0, 70.0).unwrap(), 120.0);
    }

    #[test]
    fn overdraft_withdraw_rejected() {
        assert!(matches!(
            apply(EntryKind::Withdraw, 101.0, 100.0),
            Err(LedgerError::InsufficientFunds)
        ));
    }

    #[test]
    fn transfer_over_balance_rejected() {
        assert!(matches!(
            apply(EntryKind::Transfer, 500.0, 100.0),
            Err(LedgerError::InsufficientFunds)
        ));
    }

    #[test]
    fn zero_and_negative_amounts_rejected() {
        for kind in [EntryKind::Withdraw, EntryKind::Deposit, EntryKind::Transfer] {
            assert!(matches!(apply(kind, 0.0, 100.0), Err(LedgerError::NonPositiveAmount)));
            assert!(matches!(apply(kind, -5.0, 100.0), Err(LedgerError::NonPositiveAmount)));
        }
    }

    #[test]
    fn exact_balance_withdraw_allowed() {
        assert_eq!(apply(EntryKind::Withdraw, 100.0, 100.0).unwrap(), 0.0);
    }

    #[test]
    fn scenario_withdraw_then_deposit() {
        // New user, balance 100: withdraw 30 then deposit 50.
        let after_withdraw = apply(EntryKind::Withdraw, 30.0, 100.0).unwrap();
        assert_eq!(after_withdraw, 70.0);

        let after_deposit = apply(EntryKind::Deposit, 50.0, after_withdraw).unwrap();
        assert_eq!(after_deposit, 120.0);

        let recorded = entry(EntryKind::Deposit, 50.0, after_deposit);
        assert_eq!(recorded.balance_after, 120.0);
        assert_eq!(recorded.kind, EntryKind::Deposit);
    }

    #[test]
    fn entry_json_uses_type_field() {
        let serialized = serde_json::to_string(&entry(EntryKind::Withdraw, 30.0, 70.0)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(value["type"], "withdraw");
        assert_eq!(value["balance_after"], 70.0);
    }
}
