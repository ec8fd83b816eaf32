//! Error taxonomy surfaced by the external API client

use thiserror::Error;

use super::ProviderKind;

/// Errors returned by the normalized client operations.
///
/// Provider-specific errors are converted into one of these kinds at the
/// client boundary, so callers never see vendor error types.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("{provider} provider unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Invalid analytics property '{property_id}': {reason}")]
    InvalidProperty { property_id: String, reason: String },

    #[error("Malformed {provider} response: {reason}")]
    MalformedResponse {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Failed to write usage record: {0}")]
    SinkWriteFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn unavailable(provider: ProviderKind, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            reason: reason.into(),
        }
    }

    pub fn malformed(provider: ProviderKind, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::InvalidProperty { .. } => "invalid_property",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::SinkWriteFailed(_) => "sink_write_failed",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}
