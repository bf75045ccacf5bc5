use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use crate::db::event_store::{EventStoreError, InsertResult, WebhookEventStore};
use crate::models::webhook_event::WebhookEventRow;

pub struct PostgresWebhookEventStore {
    pub pool: PgPool,
}

#[async_trait]
impl WebhookEventStore for PostgresWebhookEventStore {
    async fn record_ingested(
        &self,
        event_id: &str,
        event_type: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<InsertResult, EventStoreError> {
        let result = sqlx::query::<Postgres>(
            r#"
            INSERT INTO webhook_events (event_id, event_type, raw_payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(raw_payload)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(InsertResult::Inserted)
        } else {
            Ok(InsertResult::AlreadyPresent)
        }
    }

    async fn has_been_processed(&self, event_id: &str) -> Result<bool, EventStoreError> {
        let exists = sqlx::query_scalar::<Postgres, i32>(
            "SELECT 1 FROM webhook_events WHERE event_id = $1 AND processed_at IS NOT NULL",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        Ok(exists)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), EventStoreError> {
        let updated = sqlx::query::<Postgres>(
            r#"
            UPDATE webhook_events
            SET processed_at = now()
            WHERE event_id = $1 AND processed_at IS NULL
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            return Ok(());
        }

        // Zero rows means either already marked (fine, idempotent) or never
        // ingested (caller bug).
        let known = sqlx::query_scalar::<Postgres, i32>(
            "SELECT 1 FROM webhook_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        if known {
            Ok(())
        } else {
            Err(EventStoreError::NotFound(event_id.to_string()))
        }
    }

    async fn find_event(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRow>, EventStoreError> {
        let row = sqlx::query_as::<Postgres, WebhookEventRow>(
            r#"
            SELECT event_id, event_type, raw_payload, received_at, processed_at
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
