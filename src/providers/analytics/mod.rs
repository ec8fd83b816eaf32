//! Analytics provider
//!
//! Runs reports against the analytics Data API (`properties/{id}:runReport`)
//! and returns them in columnar form.

mod report;

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::AnalyticsSettings;
use crate::core::Secret;

pub use report::{normalize_property_id, ColumnarReport, DateRange, ReportQuery, RowLengthMismatch};

use report::RunReportResponse;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Analytics API key not configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Property rejected ({status}): {message}")]
    PropertyRejected { status: u16, message: String },

    #[error("Query rejected: {0}")]
    BadRequest(String),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Analytics API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Analytics Data API client
pub struct AnalyticsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret,
}

impl AnalyticsClient {
    pub fn new(settings: &AnalyticsSettings, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    /// Run a report query
    pub async fn run_report(&self, query: &ReportQuery) -> Result<ColumnarReport, AnalyticsError> {
        if self.api_key.is_empty() {
            return Err(AnalyticsError::MissingApiKey);
        }

        let url = format!(
            "{}/v1beta/properties/{}:runReport",
            self.base_url, query.property_id
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("Accept", "application/json")
            .json(&query.to_request_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());

            return Err(match status.as_u16() {
                400 => AnalyticsError::BadRequest(message),
                403 | 404 => AnalyticsError::PropertyRejected {
                    status: status.as_u16(),
                    message,
                },
                401 => AnalyticsError::AuthRejected(message),
                code => AnalyticsError::Api {
                    status: code,
                    message,
                },
            });
        }

        let parsed: RunReportResponse = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Parse(e.to_string()))?;

        let report = ColumnarReport::from(parsed);
        tracing::debug!(
            property_id = %query.property_id,
            rows = report.rows.len(),
            "Analytics report received"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn client(base_url: &str) -> AnalyticsClient {
        let settings = AnalyticsSettings {
            api_key: Secret::new("ga-key"),
            base_url: base_url.to_string(),
            ..AnalyticsSettings::default()
        };
        AnalyticsClient::new(&settings, Duration::from_secs(5))
    }

    fn query(property_id: &str) -> ReportQuery {
        ReportQuery {
            property_id: property_id.to_string(),
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            )
            .unwrap(),
            metrics: vec!["activeUsers".to_string()],
            dimensions: vec!["date".to_string()],
        }
    }

    #[tokio::test]
    async fn test_run_report() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/properties/123:runReport")
            .match_header("x-goog-api-key", "ga-key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"metrics":[{"name":"activeUsers"}],"dimensions":[{"name":"date"}]}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"dimensionHeaders":[{"name":"date"}],"metricHeaders":[{"name":"activeUsers"}],
                   "rows":[{"dimensionValues":[{"value":"20230101"}],"metricValues":[{"value":"10"}]}]}"#,
            )
            .create_async()
            .await;

        let report = client(&server.url()).run_report(&query("123")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(report.column_headers, vec!["date", "activeUsers"]);
        assert_eq!(report.rows, vec![vec!["20230101".to_string(), "10".to_string()]]);
    }

    #[tokio::test]
    async fn test_run_report_property_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/properties/999:runReport")
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"User does not have sufficient permissions for this property.","status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        match client(&server.url()).run_report(&query("999")).await {
            Err(AnalyticsError::PropertyRejected { status, message }) => {
                assert_eq!(status, 403);
                assert!(message.contains("sufficient permissions"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_report_bad_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/properties/123:runReport")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"Did you mean activeUsers? Field activeUser is not a valid metric.","status":"INVALID_ARGUMENT"}}"#)
            .create_async()
            .await;

        match client(&server.url()).run_report(&query("123")).await {
            Err(AnalyticsError::BadRequest(message)) => assert!(message.contains("not a valid metric")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_report_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/properties/123:runReport")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        assert!(matches!(
            client(&server.url()).run_report(&query("123")).await,
            Err(AnalyticsError::Api { status: 503, .. })
        ));
    }
}
