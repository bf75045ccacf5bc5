use async_trait::async_trait;

use crate::models::webhook_event::WebhookEventRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("event {0} was never ingested")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Durable, append-only log of every webhook event ever received.
///
/// Uniqueness on `event_id` is the idempotency mechanism for deliveries and
/// must be enforced by the storage layer (unique constraint), never by a
/// check-then-insert in application code.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Insert the event if it has never been seen. Atomic: concurrent calls
    /// with the same `event_id` yield exactly one `Inserted`.
    async fn record_ingested(
        &self,
        event_id: &str,
        event_type: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<InsertResult, EventStoreError>;

    async fn has_been_processed(&self, event_id: &str) -> Result<bool, EventStoreError>;

    /// Set `processed_at` on a previously ingested event. Idempotent;
    /// `NotFound` if the event was never ingested.
    async fn mark_processed(&self, event_id: &str) -> Result<(), EventStoreError>;

    async fn find_event(&self, event_id: &str)
        -> Result<Option<WebhookEventRow>, EventStoreError>;
}
