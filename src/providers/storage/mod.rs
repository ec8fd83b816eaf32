//! Object storage provider
//!
//! Lists buckets through the S3-compatible REST API, signing each request
//! with SigV4.

mod signing;

use regex_lite::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::config::StorageSettings;
use crate::core::Secret;

use signing::{sign_request, SigningScope};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage credentials not configured")]
    MissingCredentials,

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Credentials rejected ({status}): {code}")]
    AuthRejected { status: u16, code: String },

    #[error("Storage API returned {status}: {code}")]
    Api { status: u16, code: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Buckets visible to the configured credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub buckets: Vec<String>,
    pub region: String,
}

fn bucket_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<Name>([^<]*)</Name>").expect("Invalid bucket name regex"))
}

fn error_code_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<Code>([^<]*)</Code>").expect("Invalid error code regex"))
}

/// Extract bucket names from a `ListAllMyBucketsResult` document, in order
pub fn parse_bucket_names(xml: &str) -> Result<Vec<String>, StorageError> {
    if !xml.contains("<ListAllMyBucketsResult") {
        return Err(StorageError::Parse(
            "response is not a ListAllMyBucketsResult document".to_string(),
        ));
    }

    Ok(bucket_name_regex()
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect())
}

fn error_code(xml: &str) -> String {
    error_code_regex()
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "UnknownError".to_string())
}

/// Storage REST client
pub struct StorageClient {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    access_key_id: Secret,
    secret_key: Secret,
}

impl StorageClient {
    pub fn new(settings: &StorageSettings, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: settings.endpoint_url(),
            region: settings.region.clone(),
            access_key_id: settings.access_key_id.clone(),
            secret_key: settings.secret_key.clone(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// List every bucket owned by the configured account
    pub async fn list_buckets(&self) -> Result<StorageUsage, StorageError> {
        if self.access_key_id.is_empty() || self.secret_key.is_empty() {
            return Err(StorageError::MissingCredentials);
        }

        let url = format!("{}/", self.endpoint);
        let scope = SigningScope {
            access_key_id: self.access_key_id.expose(),
            secret_key: self.secret_key.expose(),
            region: &self.region,
        };
        let signed_headers = sign_request("GET", &url, &scope, SystemTime::now())?;

        let mut request = self.client.get(&url);
        for (name, value) in &signed_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StorageError::AuthRejected {
                status: status.as_u16(),
                code: error_code(&body),
            });
        }

        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                code: error_code(&body),
            });
        }

        let buckets = parse_bucket_names(&body)?;
        tracing::debug!(count = buckets.len(), region = %self.region, "Listed storage buckets");

        Ok(StorageUsage {
            buckets,
            region: self.region.clone(),
        })
    }
}
