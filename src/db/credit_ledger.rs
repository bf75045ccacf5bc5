use async_trait::async_trait;
use uuid::Uuid;

use crate::models::credit::{LedgerEntryRow, LedgerReason};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: i64, requested: i64 },
    #[error("a ledger entry for event {0} already exists")]
    DuplicateSourceEvent(String),
    #[error("storage contention persisted after {0} attempts")]
    Contention(u32),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Per-user credit balance with an append-only audit trail.
///
/// Every mutation is atomic and serialized per account: a credit and a
/// concurrent debit on the same `user_id` never interleave, and the balance
/// is never observable below zero. Different accounts proceed in parallel.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Add `amount` (> 0) credits. When `source_event_id` is set, at most one
    /// entry can ever exist for that event; a second application fails with
    /// `DuplicateSourceEvent` and leaves the balance untouched.
    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
    ) -> Result<i64, LedgerError>;

    /// Remove `amount` (> 0) credits, failing with `InsufficientCredits`
    /// (balance unchanged) when the account would go negative.
    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        operation_id: Option<&str>,
    ) -> Result<i64, LedgerError>;

    /// Current balance; 0 for accounts that have never been touched.
    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError>;

    /// Audit trail for one account, newest first.
    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, LedgerError>;
}
