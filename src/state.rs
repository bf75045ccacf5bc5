use crate::config::Config;
use crate::db::credit_ledger::CreditLedger;
use crate::db::event_store::WebhookEventStore;
use crate::services::credit_gate::CreditGate;
use crate::services::payments::PaymentProvider;
use crate::utils::jwt::JwtKeys;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn WebhookEventStore>,
    pub ledger: Arc<dyn CreditLedger>,
    pub payments: Arc<dyn PaymentProvider>,
    pub credit_gate: CreditGate,
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}

/// Lazy pool for handler tests; never actually connects unless a test is
/// wired to real storage.
#[cfg(test)]
pub fn test_pg_pool() -> PgPool {
    PgPool::connect_lazy("postgres://127.0.0.1:5432/revamp_test")
        .expect("lazy test pool should build")
}
