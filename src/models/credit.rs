use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "ledger_reason", rename_all = "snake_case")] // matches the Postgres enum
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Purchase,
    OptimizationConsumed,
    Refund,
    Adjustment,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Purchase => "purchase",
            LedgerReason::OptimizationConsumed => "optimization_consumed",
            LedgerReason::Refund => "refund",
            LedgerReason::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: OffsetDateTime,
}

/// Immutable audit record of a single balance mutation. The per-user sum of
/// `delta` must always equal the account balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntryRow {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub delta: i64,
    pub reason: LedgerReason,
    pub source_event_id: Option<String>,
    pub operation_id: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_reason_round_trips_through_serde() {
        let json = serde_json::to_string(&LedgerReason::OptimizationConsumed).unwrap();
        assert_eq!(json, "\"optimization_consumed\"");
        let back: LedgerReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LedgerReason::OptimizationConsumed);
    }

    #[test]
    fn ledger_reason_as_str_matches_storage_values() {
        assert_eq!(LedgerReason::Purchase.as_str(), "purchase");
        assert_eq!(LedgerReason::Refund.as_str(), "refund");
        assert_eq!(LedgerReason::Adjustment.as_str(), "adjustment");
    }
}
