use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use super::{parse_event, PaymentEvent, PaymentProvider, SignatureError};

type HmacSha256 = Hmac<Sha256>;

/// Verifies the provider's `t=<unix>,v1=<hex>` signature header: an
/// HMAC-SHA256 over `"{t}.{raw_body}"` keyed by the shared webhook secret.
/// Several `v1=` entries may be present during secret rotation; any match
/// accepts.
pub struct LivePaymentProvider {
    webhook_secret: String,
    replay_tolerance_secs: i64,
}

impl LivePaymentProvider {
    pub fn new(webhook_secret: impl Into<String>, replay_tolerance_secs: i64) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            replay_tolerance_secs,
        }
    }

    pub fn from_settings(settings: &crate::config::PaymentSettings) -> Self {
        Self::new(
            settings.webhook_secret.clone(),
            settings.replay_tolerance_secs,
        )
    }

    fn expected_signature(&self, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl PaymentProvider for LivePaymentProvider {
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, SignatureError> {
        let mut timestamp: Option<&str> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("t=") {
                timestamp = Some(value);
            } else if let Some(value) = part.strip_prefix("v1=") {
                candidates.push(value);
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        let signed_at = timestamp
            .parse::<i64>()
            .map_err(|_| SignatureError::Malformed)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if signed_at <= 0 || (now - signed_at).abs() > self.replay_tolerance_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        let expected = self.expected_signature(timestamp, payload);
        let matched = candidates
            .iter()
            .any(|candidate| expected.as_bytes().ct_eq(candidate.as_bytes()).unwrap_u8() == 1);
        if !matched {
            return Err(SignatureError::BadSignature);
        }

        parse_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_0123456789abcdef";

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn header_for(payload: &[u8]) -> String {
        let ts = OffsetDateTime::now_utc().unix_timestamp();
        format!("t={},v1={}", ts, sign(SECRET, ts, payload))
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = br#"{"id": "evt_1", "type": "checkout.session.completed"}"#;

        let event = provider
            .verify_webhook(payload, &header_for(payload))
            .unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.r#type, "checkout.session.completed");
    }

    #[test]
    fn accepts_rotation_headers_with_multiple_candidates() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = br#"{"id": "evt_1", "type": "checkout.session.completed"}"#;
        let ts = OffsetDateTime::now_utc().unix_timestamp();
        let header = format!(
            "t={ts},v1={},v1={}",
            "0".repeat(64),
            sign(SECRET, ts, payload)
        );

        assert!(provider.verify_webhook(payload, &header).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = br#"{"id": "evt_1", "type": "checkout.session.completed"}"#;
        let header = header_for(payload);

        let tampered = br#"{"id": "evt_2", "type": "checkout.session.completed"}"#;
        let err = provider.verify_webhook(tampered, &header).unwrap_err();
        assert!(matches!(err, SignatureError::BadSignature));
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let provider = LivePaymentProvider::new("whsec_other", 300);
        let payload = br#"{"id": "evt_1", "type": "checkout.session.completed"}"#;

        let err = provider
            .verify_webhook(payload, &header_for(payload))
            .unwrap_err();
        assert!(matches!(err, SignatureError::BadSignature));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = br#"{"id": "evt_1", "type": "checkout.session.completed"}"#;
        let old = OffsetDateTime::now_utc().unix_timestamp() - 3600;
        let header = format!("t={},v1={}", old, sign(SECRET, old, payload));

        let err = provider.verify_webhook(payload, &header).unwrap_err();
        assert!(matches!(err, SignatureError::StaleTimestamp));
    }

    #[test]
    fn rejects_malformed_headers() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = br#"{"id": "evt_1", "type": "x"}"#;

        for header in ["", "v1=deadbeef", "t=123", "t=abc,v1=deadbeef"] {
            let err = provider.verify_webhook(payload, header).unwrap_err();
            assert!(
                matches!(err, SignatureError::Malformed),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn rejects_non_json_bodies_after_a_valid_signature() {
        let provider = LivePaymentProvider::new(SECRET, 300);
        let payload = b"not json";

        let err = provider
            .verify_webhook(payload, &header_for(payload))
            .unwrap_err();
        assert!(matches!(err, SignatureError::Payload(_)));
    }
}
