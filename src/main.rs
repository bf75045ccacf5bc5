use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use revamp_billing::config::Config;
use revamp_billing::db::credit_ledger::CreditLedger;
use revamp_billing::db::event_store::WebhookEventStore;
use revamp_billing::db::postgres_credit_ledger::PostgresCreditLedger;
use revamp_billing::db::postgres_event_store::PostgresWebhookEventStore;
use revamp_billing::responses::JsonResponse;
use revamp_billing::routes::credits::{check_credits, credit_history, start_optimization};
use revamp_billing::routes::webhooks::provider_webhook;
use revamp_billing::services::credit_gate::CreditGate;
use revamp_billing::services::payments::{LivePaymentProvider, PaymentProvider};
use revamp_billing::state::AppState;
use revamp_billing::utils::jwt::JwtKeys;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        // Default: allow short bursts during client polling
        .unwrap_or(20);
    let api_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background cleanup of old client IPs in the limiter map
    let governor_limiter = api_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Config::from_env();
    let jwt_keys = Arc::new(JwtKeys::from_env()?);

    let pg_pool = establish_connection(&config.database_url).await;

    let events = Arc::new(PostgresWebhookEventStore {
        pool: pg_pool.clone(),
    }) as Arc<dyn WebhookEventStore>;
    let ledger = Arc::new(PostgresCreditLedger {
        pool: pg_pool.clone(),
    }) as Arc<dyn CreditLedger>;
    let payments =
        Arc::new(LivePaymentProvider::from_settings(&config.payments)) as Arc<dyn PaymentProvider>;
    let credit_gate = CreditGate::new(ledger.clone());

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let state = AppState {
        events,
        ledger,
        payments,
        credit_gate,
        db_pool: pg_pool,
        config: Arc::new(config),
        jwt_keys,
    };

    // Authenticated credit API, rate limited per client IP
    let api_routes = Router::new()
        .route("/credits/check", get(check_credits))
        .route("/credits/history", get(credit_history))
        .route("/optimizations", post(start_optimization))
        .layer(GovernorLayer {
            config: api_governor_conf.clone(),
        });

    // Public webhook ingress: no session auth, the signature is the
    // authentication. Not rate limited; the provider controls redelivery.
    let webhook_routes = Router::new().route("/webhooks/{provider}", post(provider_webhook));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api_routes)
        .merge(webhook_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    let listener = TcpListener::bind(addr).await?;
    info!("Listening at http://{}", addr);
    axum::serve(listener, make_service).await?;
    Ok(())
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Revamp billing core").into_response()
}

/// Establish a connection to the database, apply migrations, and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
