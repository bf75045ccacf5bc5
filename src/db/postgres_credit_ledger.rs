use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tracing::warn;
use uuid::Uuid;

use crate::db::credit_ledger::{CreditLedger, LedgerError};
use crate::models::credit::{CreditAccount, LedgerEntryRow, LedgerReason};

const MAX_TX_ATTEMPTS: u32 = 3;

pub struct PostgresCreditLedger {
    pub pool: PgPool,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Serialization failure or deadlock; safe to retry the whole transaction.
fn is_retryable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
    )
}

impl PostgresCreditLedger {
    /// One balance mutation: ensure the account row exists, lock it, check
    /// the invariant, update the balance, append the ledger entry. All or
    /// nothing.
    async fn apply(
        &self,
        user_id: Uuid,
        delta: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
        operation_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query::<Postgres>(
            "INSERT INTO credit_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let account = sqlx::query_as::<Postgres, CreditAccount>(
            "SELECT user_id, balance, updated_at FROM credit_accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if delta < 0 && account.balance + delta < 0 {
            tx.rollback().await?;
            return Err(LedgerError::InsufficientCredits {
                balance: account.balance,
                requested: -delta,
            });
        }

        let new_balance = sqlx::query_scalar::<Postgres, i64>(
            r#"
            UPDATE credit_accounts
            SET balance = balance + $2, updated_at = now()
            WHERE user_id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query::<Postgres>(
            r#"
            INSERT INTO ledger_entries (entry_id, user_id, delta, reason, source_event_id, operation_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(delta)
        .bind(reason)
        .bind(source_event_id)
        .bind(operation_id)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            tx.rollback().await?;
            if is_unique_violation(&err) {
                // A concurrent delivery of the same webhook event committed
                // its entry first; our balance update rolled back with us.
                return Err(LedgerError::DuplicateSourceEvent(
                    source_event_id.unwrap_or_default().to_string(),
                ));
            }
            return Err(err.into());
        }

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn apply_with_retry(
        &self,
        user_id: Uuid,
        delta: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
        operation_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .apply(user_id, delta, reason, source_event_id, operation_id)
                .await
            {
                Err(LedgerError::Storage(err)) if is_retryable(&err) => {
                    if attempt >= MAX_TX_ATTEMPTS {
                        return Err(LedgerError::Contention(attempt));
                    }
                    warn!(%user_id, attempt, "ledger transaction conflict, retrying");
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply_with_retry(user_id, amount, reason, source_event_id, None)
            .await
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        operation_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply_with_retry(user_id, -amount, reason, None, operation_id)
            .await
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        let balance = sqlx::query_scalar::<Postgres, i64>(
            "SELECT balance FROM credit_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or(0))
    }

    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, LedgerError> {
        let rows = sqlx::query_as::<Postgres, LedgerEntryRow>(
            r#"
            SELECT entry_id, user_id, delta, reason, source_event_id, operation_id, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
