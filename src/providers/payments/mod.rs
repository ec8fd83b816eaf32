//! Payments provider
//!
//! Lists payouts over the provider's REST API and verifies signed webhook
//! deliveries. Authenticates with a secret API key as a bearer token.

mod webhook;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::PaymentsSettings;
use crate::core::Secret;

pub use webhook::{EventOutcome, SignatureHeader, WebhookError, WebhookEvent, WebhookVerifier};

#[cfg(test)]
pub(crate) use webhook::sign_payload;

const PAYOUTS_PATH: &str = "/v1/payouts";

/// Errors raised by the payments REST client
#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("Payments API key not configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication rejected ({status}): {message}")]
    AuthRejected { status: u16, message: String },

    #[error("Payments API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Error envelope returned by the payments API
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Payments REST client
pub struct PaymentsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret,
    payouts_limit: u32,
}

impl PaymentsClient {
    pub fn new(settings: &PaymentsSettings, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            payouts_limit: settings.payouts_limit,
        }
    }

    /// Fetch the most recent payouts as the provider's raw list object
    pub async fn list_payouts(&self) -> Result<Map<String, Value>, PaymentsError> {
        if self.api_key.is_empty() {
            return Err(PaymentsError::MissingApiKey);
        }

        let url = format!("{}{}", self.base_url, PAYOUTS_PATH);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .header("Accept", "application/json")
            .query(&[("limit", self.payouts_limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(PaymentsError::AuthRejected {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(PaymentsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| PaymentsError::Parse(e.to_string()))?;

        match json {
            Value::Object(map) => Ok(map),
            other => Err(PaymentsError::Parse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

/// Pull the human-readable message out of an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.message, envelope.error.kind) {
            (Some(message), _) => message,
            (None, Some(kind)) => kind,
            (None, None) => "unknown error".to_string(),
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
