pub mod credit_ledger;
pub mod event_store;
pub mod mock_credit_ledger;
pub mod mock_event_store;
pub mod postgres_credit_ledger;
pub mod postgres_event_store;
