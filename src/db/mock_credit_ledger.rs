use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::credit_ledger::{CreditLedger, LedgerError};
use crate::models::credit::{LedgerEntryRow, LedgerReason};

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Uuid, i64>,
    entries: Vec<LedgerEntryRow>,
    source_events: HashSet<String>,
}

/// In-memory ledger honoring the same contract as the Postgres
/// implementation: every mutation (invariant check included) runs inside one
/// critical section, so concurrent callers observe serialized per-account
/// ordering.
#[derive(Clone, Default)]
pub struct MockCreditLedger {
    state: Arc<Mutex<LedgerState>>,
    pub credit_calls: Arc<Mutex<usize>>,
    pub debit_calls: Arc<Mutex<usize>>,
    /// Number of upcoming `credit` calls that fail with a storage error.
    pub fail_credits: Arc<Mutex<usize>>,
}

impl MockCreditLedger {
    fn push_entry(
        state: &mut LedgerState,
        user_id: Uuid,
        delta: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
        operation_id: Option<&str>,
    ) {
        state.entries.push(LedgerEntryRow {
            entry_id: Uuid::new_v4(),
            user_id,
            delta,
            reason,
            source_event_id: source_event_id.map(|s| s.to_string()),
            operation_id: operation_id.map(|s| s.to_string()),
            created_at: OffsetDateTime::now_utc(),
        });
    }
}

#[async_trait]
impl CreditLedger for MockCreditLedger {
    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        source_event_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut calls = self.credit_calls.lock().unwrap();
        *calls += 1;
        drop(calls);

        let mut failures = self.fail_credits.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(LedgerError::Storage(sqlx::Error::Protocol(
                "injected ledger failure".into(),
            )));
        }
        drop(failures);

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.lock().unwrap();
        if let Some(src) = source_event_id {
            if !state.source_events.insert(src.to_string()) {
                return Err(LedgerError::DuplicateSourceEvent(src.to_string()));
            }
        }
        let balance = state.balances.entry(user_id).or_insert(0);
        *balance += amount;
        let new_balance = *balance;
        Self::push_entry(&mut state, user_id, amount, reason, source_event_id, None);
        Ok(new_balance)
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        operation_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut calls = self.debit_calls.lock().unwrap();
        *calls += 1;
        drop(calls);

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.lock().unwrap();
        let balance = state.balances.get(&user_id).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientCredits {
                balance,
                requested: amount,
            });
        }
        let new_balance = balance - amount;
        state.balances.insert(user_id, new_balance);
        Self::push_entry(&mut state, user_id, -amount, reason, None, operation_id);
        Ok(new_balance)
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, LedgerError> {
        let mut rows: Vec<LedgerEntryRow> = self
            .state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }
}
