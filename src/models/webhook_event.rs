use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// One provider webhook delivery, as persisted. Rows are append-only;
/// `processed_at` is the only column that ever changes, and it is set at
/// most once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookEventRow {
    pub event_id: String,
    pub event_type: String,
    pub raw_payload: serde_json::Value,
    pub received_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
}

impl WebhookEventRow {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}
