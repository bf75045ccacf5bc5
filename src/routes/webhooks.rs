use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::credit_ledger::LedgerError;
use crate::db::event_store::InsertResult;
use crate::models::credit::LedgerReason;
use crate::responses::JsonResponse;
use crate::services::payments::{PaymentEvent, SignatureError};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

// Small helper: nested json lookup
fn jget<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut cur = val;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn extract_metadata_user_id(event: &serde_json::Value) -> Option<Uuid> {
    let obj = jget(event, &["data", "object"])?;
    // Prefer explicit metadata.user_id
    if let Some(uid) = obj
        .get("metadata")
        .and_then(|m| m.get("user_id"))
        .and_then(|v| v.as_str())
    {
        if let Ok(id) = Uuid::parse_str(uid) {
            return Some(id);
        }
    }
    // Fallback to client_reference_id (checkout sets it to the user id)
    if let Some(id_str) = obj.get("client_reference_id").and_then(|v| v.as_str()) {
        if let Ok(id) = Uuid::parse_str(id_str) {
            return Some(id);
        }
    }
    None
}

fn extract_metadata_credits(event: &serde_json::Value) -> Option<i64> {
    let meta = jget(event, &["data", "object", "metadata"])?;
    match meta.get("credits")? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

fn received() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn already_processed() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "received": true, "duplicate": true })),
    )
        .into_response()
}

/// 5xx tells the provider to redeliver; the event stays ingested with
/// `processed_at` null so the retry reattempts the mutation.
fn retry_later(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "received": false, "error": msg })),
    )
        .into_response()
}

// POST /webhooks/{provider}
pub async fn provider_webhook(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if provider != app_state.config.payments.provider {
        return JsonResponse::not_found("Unknown payment provider").into_response();
    }

    let sig = match headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok()) {
        Some(s) => s,
        None => return JsonResponse::unauthorized("Missing signature header").into_response(),
    };

    // The raw body is never parsed before this call succeeds.
    let evt = match app_state.payments.verify_webhook(&body, sig) {
        Ok(e) => e,
        Err(SignatureError::Payload(msg)) => {
            warn!(%provider, %msg, "authentic webhook with unusable body");
            return JsonResponse::bad_request("Unparsable webhook body").into_response();
        }
        Err(err) => {
            warn!(?err, %provider, "webhook signature verification failed");
            return JsonResponse::unauthorized("Invalid webhook signature").into_response();
        }
    };

    let inserted = match app_state
        .events
        .record_ingested(&evt.id, &evt.r#type, &evt.payload)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            error!(?err, event_id = %evt.id, "failed to record webhook event");
            return retry_later("event ingestion failed");
        }
    };

    if inserted == InsertResult::AlreadyPresent {
        match app_state.events.has_been_processed(&evt.id).await {
            Ok(true) => {
                info!(event_id = %evt.id, "duplicate webhook delivery acknowledged");
                return already_processed();
            }
            Ok(false) => {
                // Ingested earlier but never finished; run it again.
                info!(event_id = %evt.id, "re-processing previously failed webhook event");
            }
            Err(err) => {
                error!(?err, event_id = %evt.id, "failed to check event status");
                return retry_later("event lookup failed");
            }
        }
    }

    dispatch(&app_state, &evt).await
}

async fn dispatch(app_state: &AppState, evt: &PaymentEvent) -> Response {
    match evt.r#type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(app_state, evt).await,

        // Informational: the customer keeps whatever credits they had.
        "payment_intent.payment_failed" | "invoice.payment_failed" => {
            warn!(event_id = %evt.id, event_type = %evt.r#type, "payment failure reported by provider");
            finish(app_state, evt, received()).await
        }

        // Unrecognized events are acknowledged so the provider stops retrying.
        _ => {
            info!(event_id = %evt.id, event_type = %evt.r#type, "unhandled webhook event acknowledged");
            finish(app_state, evt, received()).await
        }
    }
}

/// Terminal transition: set `processed_at`, then answer `response`.
async fn finish(app_state: &AppState, evt: &PaymentEvent, response: Response) -> Response {
    if let Err(err) = app_state.events.mark_processed(&evt.id).await {
        error!(?err, event_id = %evt.id, "failed to mark webhook event processed");
        return retry_later("event bookkeeping failed");
    }
    response
}

async fn handle_checkout_completed(app_state: &AppState, evt: &PaymentEvent) -> Response {
    let user_id = match extract_metadata_user_id(&evt.payload) {
        Some(id) => id,
        None => {
            warn!(event_id = %evt.id, "checkout completion without a resolvable user id");
            return retry_later("missing user id in checkout metadata");
        }
    };

    let credits = match extract_metadata_credits(&evt.payload) {
        Some(n) if n > 0 => n,
        _ => {
            warn!(event_id = %evt.id, %user_id, "checkout completion without a positive credit amount");
            return retry_later("missing credit amount in checkout metadata");
        }
    };

    match app_state
        .ledger
        .credit(user_id, credits, LedgerReason::Purchase, Some(&evt.id))
        .await
    {
        Ok(new_balance) => {
            info!(event_id = %evt.id, %user_id, credits, new_balance, "purchase credited");
            finish(app_state, evt, received()).await
        }
        Err(LedgerError::DuplicateSourceEvent(_)) => {
            // A concurrent delivery of this event already credited it.
            info!(event_id = %evt.id, %user_id, "credit already applied for this event");
            finish(app_state, evt, already_processed()).await
        }
        Err(err) => {
            error!(?err, event_id = %evt.id, %user_id, "failed to credit purchase");
            retry_later("credit application failed")
        }
    }
}
