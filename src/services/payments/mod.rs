use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("signed timestamp outside the replay window")]
    StaleTimestamp,
    #[error("payload rejected: {0}")]
    Payload(String),
}

/// A provider notification that passed authentication. `payload` is the
/// parsed event body; parsing only ever happens after the signature check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    pub r#type: String,
    pub payload: serde_json::Value,
}

/// Seam to the payment provider. The live implementation verifies the
/// provider's timestamped HMAC scheme; the mock accepts anything and exists
/// for handler tests.
pub trait PaymentProvider: Send + Sync {
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, SignatureError>;
}

/// Shared post-verification parse: the body must be JSON carrying the
/// provider's `id` and `type` fields.
pub(crate) fn parse_event(payload: &[u8]) -> Result<PaymentEvent, SignatureError> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|err| SignatureError::Payload(err.to_string()))?;

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SignatureError::Payload("missing event id".into()))?
        .to_string();
    let r#type = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SignatureError::Payload("missing event type".into()))?
        .to_string();

    Ok(PaymentEvent {
        id,
        r#type,
        payload: value,
    })
}

mod live;
mod mock;

pub use live::LivePaymentProvider;
pub use mock::MockPaymentProvider;
