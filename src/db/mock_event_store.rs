use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::db::event_store::{EventStoreError, InsertResult, WebhookEventStore};
use crate::models::webhook_event::WebhookEventRow;

#[derive(Clone, Default)]
pub struct MockWebhookEventStore {
    events: Arc<Mutex<HashMap<String, WebhookEventRow>>>,
    pub checks: Arc<Mutex<usize>>,
    pub inserts: Arc<Mutex<usize>>,
}

impl MockWebhookEventStore {
    #[allow(dead_code)]
    pub fn recorded_events(&self) -> Vec<String> {
        self.events.lock().unwrap().keys().cloned().collect()
    }

    pub fn processed_events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.is_processed())
            .map(|e| e.event_id.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookEventStore for MockWebhookEventStore {
    async fn record_ingested(
        &self,
        event_id: &str,
        event_type: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<InsertResult, EventStoreError> {
        let mut guard = self.inserts.lock().unwrap();
        *guard += 1;
        drop(guard);

        let mut events = self.events.lock().unwrap();
        if events.contains_key(event_id) {
            return Ok(InsertResult::AlreadyPresent);
        }
        events.insert(
            event_id.to_string(),
            WebhookEventRow {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                raw_payload: raw_payload.clone(),
                received_at: OffsetDateTime::now_utc(),
                processed_at: None,
            },
        );
        Ok(InsertResult::Inserted)
    }

    async fn has_been_processed(&self, event_id: &str) -> Result<bool, EventStoreError> {
        let mut guard = self.checks.lock().unwrap();
        *guard += 1;
        drop(guard);

        Ok(self
            .events
            .lock()
            .unwrap()
            .get(event_id)
            .map(|e| e.is_processed())
            .unwrap_or(false))
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), EventStoreError> {
        let mut events = self.events.lock().unwrap();
        match events.get_mut(event_id) {
            Some(event) => {
                if event.processed_at.is_none() {
                    event.processed_at = Some(OffsetDateTime::now_utc());
                }
                Ok(())
            }
            None => Err(EventStoreError::NotFound(event_id.to_string())),
        }
    }

    async fn find_event(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRow>, EventStoreError> {
        Ok(self.events.lock().unwrap().get(event_id).cloned())
    }
}
