use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::db::credit_ledger::{CreditLedger, LedgerError};
use crate::models::credit::LedgerReason;

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub user_id: Uuid,
    pub operation_id: String,
    pub remaining: i64,
}

/// Pre-flight check for credit-consuming features: atomically takes one
/// credit off the caller's account before the gated work starts.
#[derive(Clone)]
pub struct CreditGate {
    ledger: Arc<dyn CreditLedger>,
}

impl CreditGate {
    pub fn new(ledger: Arc<dyn CreditLedger>) -> Self {
        Self { ledger }
    }

    /// Consume one credit for the operation identified by `operation_id`.
    ///
    /// The id is recorded on the ledger entry for traceability only: calling
    /// twice with the same id debits twice. Callers that need at-most-once
    /// semantics must deduplicate on their side before invoking the gate.
    pub async fn reserve_one(
        &self,
        user_id: Uuid,
        operation_id: &str,
    ) -> Result<Reservation, LedgerError> {
        let remaining = self
            .ledger
            .debit(
                user_id,
                1,
                LedgerReason::OptimizationConsumed,
                Some(operation_id),
            )
            .await?;

        Ok(Reservation {
            user_id,
            operation_id: operation_id.to_string(),
            remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_credit_ledger::MockCreditLedger;

    fn gate_over(ledger: &Arc<MockCreditLedger>) -> CreditGate {
        CreditGate::new(ledger.clone() as Arc<dyn CreditLedger>)
    }

    #[tokio::test]
    async fn reservation_consumes_exactly_one_credit() {
        let ledger = Arc::new(MockCreditLedger::default());
        let user = Uuid::new_v4();
        ledger
            .credit(user, 3, LedgerReason::Purchase, None)
            .await
            .unwrap();

        let reservation = gate_over(&ledger).reserve_one(user, "op_1").await.unwrap();

        assert_eq!(reservation.remaining, 2);
        assert_eq!(reservation.operation_id, "op_1");
        assert_eq!(ledger.balance(user).await.unwrap(), 2);

        let entries = ledger.entries(user).await.unwrap();
        assert_eq!(entries[0].delta, -1);
        assert_eq!(entries[0].reason, LedgerReason::OptimizationConsumed);
        assert_eq!(entries[0].operation_id.as_deref(), Some("op_1"));
    }

    #[tokio::test]
    async fn empty_account_is_rejected() {
        let ledger = Arc::new(MockCreditLedger::default());
        let user = Uuid::new_v4();

        let err = gate_over(&ledger).reserve_one(user, "op_1").await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits { balance: 0, .. }
        ));
    }

    #[tokio::test]
    async fn racing_reservations_on_a_single_credit_admit_exactly_one() {
        let ledger = Arc::new(MockCreditLedger::default());
        let user = Uuid::new_v4();
        ledger
            .credit(user, 1, LedgerReason::Purchase, None)
            .await
            .unwrap();

        let gate_a = gate_over(&ledger);
        let gate_b = gate_over(&ledger);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { gate_a.reserve_one(user, "op_a").await }),
            tokio::spawn(async move { gate_b.reserve_one(user, "op_b").await }),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let successes = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            Err(LedgerError::InsufficientCredits { .. })
        )));
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn repeated_operation_ids_are_independent_debits() {
        let ledger = Arc::new(MockCreditLedger::default());
        let user = Uuid::new_v4();
        ledger
            .credit(user, 2, LedgerReason::Purchase, None)
            .await
            .unwrap();

        let gate = gate_over(&ledger);
        gate.reserve_one(user, "op_1").await.unwrap();
        gate.reserve_one(user, "op_1").await.unwrap();

        assert_eq!(ledger.balance(user).await.unwrap(), 0);
        assert_eq!(ledger.entries(user).await.unwrap().len(), 3);
    }
}
