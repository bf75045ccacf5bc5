use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::db::credit_ledger::LedgerError;
use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::state::AppState;

// GET /api/credits/check
pub async fn check_credits(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let user_id = match Uuid::parse_str(&claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid user ID").into_response(),
    };

    match app_state.ledger.balance(user_id).await {
        Ok(credits) => (StatusCode::OK, Json(json!({ "credits": credits }))).into_response(),
        Err(err) => {
            error!(?err, %user_id, "failed to read credit balance");
            JsonResponse::server_error("Failed to read credit balance").into_response()
        }
    }
}

// GET /api/credits/history
pub async fn credit_history(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let user_id = match Uuid::parse_str(&claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid user ID").into_response(),
    };

    match app_state.ledger.entries(user_id).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({ "success": true, "entries": entries })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, %user_id, "failed to load ledger entries");
            JsonResponse::server_error("Failed to load credit history").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct StartOptimizationBody {
    pub operation_id: Option<String>,
}

// POST /api/optimizations
//
// Pre-flight for the optimization pipeline: one credit is reserved before
// any gated work is acknowledged. The pipeline itself lives elsewhere.
pub async fn start_optimization(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    body: Option<Json<StartOptimizationBody>>,
) -> Response {
    let user_id = match Uuid::parse_str(&claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid user ID").into_response(),
    };

    let operation_id = body
        .and_then(|Json(b)| b.operation_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match app_state.credit_gate.reserve_one(user_id, &operation_id).await {
        Ok(reservation) => (
            StatusCode::ACCEPTED,
            Json(json!({ "success": true, "reservation": reservation })),
        )
            .into_response(),
        Err(LedgerError::InsufficientCredits { balance, .. }) => {
            warn!(%user_id, balance, "optimization blocked: no credits left");
            JsonResponse::payment_required_with_code(
                "You are out of credits. Purchase more to continue.",
                "insufficient_credits",
            )
            .into_response()
        }
        Err(LedgerError::Contention(attempts)) => {
            warn!(%user_id, attempts, "credit reservation hit storage contention");
            JsonResponse::service_unavailable("Busy, please retry in a moment").into_response()
        }
        Err(err) => {
            error!(?err, %user_id, "failed to reserve a credit");
            JsonResponse::server_error("Failed to reserve a credit").into_response()
        }
    }
}
