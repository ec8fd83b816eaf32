//! Webhook signature verification
//!
//! Deliveries carry a header of the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`.
//! The signed payload is `"{t}.{raw body}"`, authenticated with HMAC-SHA256
//! under the endpoint's shared secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::core::Secret;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_SCHEME: &str = "v1";

/// Event types treated as a successful payment
const PAYMENT_SUCCEEDED_TYPES: [&str; 4] = [
    "payment_intent.succeeded",
    "invoice.payment_succeeded",
    "charge.succeeded",
    "payment_succeeded",
];

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook secret not configured")]
    MissingSecret,

    #[error("Unable to parse signature header: {0}")]
    InvalidHeader(String),

    #[error("No v1 signatures found in header")]
    NoSignatures,

    #[error("Timestamp outside the tolerance window ({age_secs}s old)")]
    TimestampOutsideTolerance { age_secs: i64 },

    #[error("No signatures found matching the expected signature for payload")]
    NoMatchingSignature,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

impl WebhookError {
    /// True when the delivery could not be authenticated, as opposed to
    /// an authenticated delivery with an unusable body
    pub fn is_signature_error(&self) -> bool {
        !matches!(self, Self::InvalidPayload(_))
    }
}

/// Parsed signature header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let parsed = value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::InvalidHeader(format!("bad timestamp '{}'", value)))?;
                    timestamp = Some(parsed);
                }
                SIGNATURE_SCHEME => {
                    // Entries that are not valid hex can never match; skip them.
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| WebhookError::InvalidHeader("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(WebhookError::NoSignatures);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Minimal view of a webhook event
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
    #[serde(default)]
    pub data: Value,
}

/// Normalized outcome of a verified webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum EventOutcome {
    /// A payment completed; carries the event id
    PaymentSucceeded(String),
    /// Any other event; carries the event type
    Other(String),
}

impl From<&WebhookEvent> for EventOutcome {
    fn from(event: &WebhookEvent) -> Self {
        if PAYMENT_SUCCEEDED_TYPES.contains(&event.event_type.as_str()) {
            Self::PaymentSucceeded(event.id.clone())
        } else {
            Self::Other(event.event_type.clone())
        }
    }
}

/// Verifies webhook deliveries against the shared secret
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Secret,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: Secret, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX),
        }
    }

    /// Verify a delivery and decode its event
    pub fn verify(&self, raw_body: &[u8], signature_header: &str) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(raw_body, signature_header, Utc::now().timestamp())
    }

    /// Verify a delivery against an explicit clock reading
    pub fn verify_at(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        if self.secret.is_empty() {
            return Err(WebhookError::MissingSecret);
        }

        let header = SignatureHeader::parse(signature_header)?;
        let expected = self.mac_for(header.timestamp, raw_body)?;

        let matched = header
            .signatures
            .iter()
            .any(|candidate| expected.clone().verify_slice(candidate).is_ok());
        if !matched {
            return Err(WebhookError::NoMatchingSignature);
        }

        // Only stale deliveries are rejected; a timestamp ahead of the local
        // clock is accepted.
        let age_secs = now.saturating_sub(header.timestamp);
        if age_secs > self.tolerance_secs {
            return Err(WebhookError::TimestampOutsideTolerance { age_secs });
        }

        serde_json::from_slice(raw_body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    fn mac_for(&self, timestamp: i64, raw_body: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose().as_bytes())
            .map_err(|_| WebhookError::MissingSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        Ok(mac)
    }
}

/// Produce a valid signature header for `raw_body`
#[cfg(test)]
pub(crate) fn sign_payload(secret: &str, timestamp: i64, raw_body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(raw_body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(Secret::new(SECRET), 300)
    }

    fn event_body(event_type: &str) -> Vec<u8> {
        format!(
            r#"{{"id":"evt_123","type":"{}","created":{},"data":{{"object":{{"id":"pi_1"}}}}}}"#,
            event_type, NOW
        )
        .into_bytes()
    }

    #[test]
    fn test_valid_payment_succeeded() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload(SECRET, NOW, &body);

        let event = verifier().verify_at(&body, &header, NOW + 10).unwrap();
        assert_eq!(EventOutcome::from(&event), EventOutcome::PaymentSucceeded("evt_123".to_string()));
        assert_eq!(event.data["object"]["id"], "pi_1");
    }

    #[test]
    fn test_valid_other_event() {
        let body = event_body("customer.created");
        let header = sign_payload(SECRET, NOW, &body);

        let event = verifier().verify_at(&body, &header, NOW).unwrap();
        assert_eq!(EventOutcome::from(&event), EventOutcome::Other("customer.created".to_string()));
    }

    #[test]
    fn test_any_matching_signature_is_accepted() {
        let body = event_body("charge.succeeded");
        let valid = sign_payload(SECRET, NOW, &body);
        let valid_sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={},v0=ignored", NOW, "00".repeat(32), valid_sig);

        assert!(verifier().verify_at(&body, &header, NOW).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload(SECRET, NOW, &body);
        let replacement = if header.ends_with('0') { '1' } else { '0' };
        let tampered = format!("{}{}", &header[..header.len() - 1], replacement);

        let err = verifier().verify_at(&body, &tampered, NOW).unwrap_err();
        assert!(matches!(err, WebhookError::NoMatchingSignature));
        assert!(err.is_signature_error());
    }

    #[test]
    fn test_tampered_body() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload(SECRET, NOW, &body);
        let other = event_body("payment_intent.canceled");

        assert!(matches!(
            verifier().verify_at(&other, &header, NOW),
            Err(WebhookError::NoMatchingSignature)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload("whsec_other", NOW, &body);

        assert!(matches!(
            verifier().verify_at(&body, &header, NOW),
            Err(WebhookError::NoMatchingSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload(SECRET, NOW, &body);

        match verifier().verify_at(&body, &header, NOW + 301) {
            Err(WebhookError::TimestampOutsideTolerance { age_secs }) => assert_eq!(age_secs, 301),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_future_timestamp_is_accepted() {
        let body = event_body("payment_intent.succeeded");
        let header = sign_payload(SECRET, NOW + 301, &body);

        let event = verifier().verify_at(&body, &header, NOW).unwrap();
        assert_eq!(EventOutcome::from(&event), EventOutcome::PaymentSucceeded("evt_123".to_string()));
    }

    #[test]
    fn test_timestamp_at_tolerance_edge() {
        let body = event_body("charge.succeeded");
        let header = sign_payload(SECRET, NOW, &body);

        assert!(verifier().verify_at(&body, &header, NOW + 300).is_ok());
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(SignatureHeader::parse("v1=abcd"), Err(WebhookError::InvalidHeader(_))));
        assert!(matches!(SignatureHeader::parse("t=abc,v1=abcd"), Err(WebhookError::InvalidHeader(_))));
        assert!(matches!(SignatureHeader::parse("t=123"), Err(WebhookError::NoSignatures)));
        assert!(matches!(SignatureHeader::parse("t=123,v1=zz"), Err(WebhookError::NoSignatures)));
        assert!(matches!(SignatureHeader::parse(""), Err(WebhookError::InvalidHeader(_))));
    }

    #[test]
    fn test_signed_garbage_is_invalid_payload() {
        let body = b"not json";
        let header = sign_payload(SECRET, NOW, body);

        let err = verifier().verify_at(body, &header, NOW).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert!(!err.is_signature_error());
    }

    #[test]
    fn test_missing_secret() {
        let verifier = WebhookVerifier::new(Secret::default(), 300);
        assert!(matches!(
            verifier.verify_at(b"{}", "t=1,v1=00", NOW),
            Err(WebhookError::MissingSecret)
        ));
    }
}
