use std::env;

pub struct PaymentSettings {
    /// Path segment the provider posts to, e.g. "stripe".
    pub provider: String,
    pub webhook_secret: String,
    /// Maximum accepted age, in seconds, of a signed webhook timestamp.
    pub replay_tolerance_secs: i64,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub payments: PaymentSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let webhook_secret =
            env::var("PAYMENT_WEBHOOK_SECRET").expect("PAYMENT_WEBHOOK_SECRET must be set");
        let provider = env::var("PAYMENT_PROVIDER").unwrap_or_else(|_| "stripe".into());
        let replay_tolerance_secs = env::var("PAYMENT_REPLAY_TOLERANCE_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(300);

        Config {
            database_url,
            frontend_origin,
            payments: PaymentSettings {
                provider,
                webhook_secret,
                replay_tolerance_secs,
            },
        }
    }
}
