use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;

use crate::routes::auth::claims::Claims;
use crate::state::AppState;
use crate::utils::jwt::decode_jwt;

#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get("auth_token").ok_or(StatusCode::UNAUTHORIZED)?;

        let data = decode_jwt(token.value(), &state.jwt_keys)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthSession(data.claims))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::{
        extract::FromRequestParts,
        http::{header, Method, Request, StatusCode},
    };
    use axum_extra::extract::cookie::Cookie;

    use crate::db::mock_credit_ledger::MockCreditLedger;
    use crate::db::mock_event_store::MockWebhookEventStore;
    use crate::routes::auth::claims::Claims;
    use crate::routes::auth::session::AuthSession;
    use crate::services::credit_gate::CreditGate;
    use crate::services::payments::MockPaymentProvider;
    use crate::state::{test_pg_pool, AppState};
    use crate::utils::jwt::{create_jwt, JwtKeys};

    fn test_state() -> AppState {
        let ledger = Arc::new(MockCreditLedger::default());
        AppState {
            events: Arc::new(MockWebhookEventStore::default()),
            ledger: ledger.clone(),
            payments: Arc::new(MockPaymentProvider::new()),
            credit_gate: CreditGate::new(ledger),
            db_pool: test_pg_pool(),
            config: Arc::new(crate::config::Config {
                database_url: String::new(),
                frontend_origin: "https://app.example.com".into(),
                payments: crate::config::PaymentSettings {
                    provider: "stripe".into(),
                    webhook_secret: "whsec_test".into(),
                    replay_tolerance_secs: 300,
                },
            }),
            jwt_keys: Arc::new(
                JwtKeys::from_secret("0123456789abcdef0123456789abcdef")
                    .expect("test JWT secret should be valid"),
            ),
        }
    }

    fn make_valid_jwt(state: &AppState) -> String {
        let claims = Claims {
            id: "user_id_123".into(),
            email: "test@example.com".into(),
            exp: (SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600) as usize,
        };
        create_jwt(&claims, &state.jwt_keys).expect("JWT should create successfully")
    }

    #[tokio::test]
    async fn test_valid_token_extracted() {
        let state = test_state();
        let jwt = make_valid_jwt(&state);
        let cookie = Cookie::new("auth_token", jwt);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &state).await;

        assert!(result.is_ok());
        let session = result.unwrap();
        assert_eq!(session.0.email, "test@example.com");
    }

    #[tokio::test]
    async fn test_missing_cookie_returns_unauthorized() {
        let state = test_state();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &state).await;

        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_invalid_token_returns_unauthorized() {
        let state = test_state();
        let cookie = Cookie::new("auth_token", "invalid.token.here");

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &state).await;

        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }
}
