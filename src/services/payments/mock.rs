use super::{parse_event, PaymentEvent, PaymentProvider, SignatureError};

/// Test double: skips signature verification entirely but still requires a
/// parsable event body, so handler tests exercise the same parse path.
#[derive(Default)]
pub struct MockPaymentProvider;

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PaymentProvider for MockPaymentProvider {
    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<PaymentEvent, SignatureError> {
        parse_event(payload)
    }
}
