//! External API client
//!
//! Owns the three provider sub-clients and exposes normalized operations.
//! Provider errors are logged and mapped into [`ClientError`] here and
//! nowhere else.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::core::{ClientError, ProviderKind};
use crate::providers::analytics::{
    normalize_property_id, AnalyticsError, ColumnarReport, DateRange, ReportQuery,
};
use crate::providers::payments::{EventOutcome, PaymentsError, WebhookError};
use crate::providers::storage::{StorageError, StorageUsage};
use crate::providers::{AnalyticsClient, PaymentsClient, StorageClient, WebhookVerifier};

/// Source of per-provider usage data consumed by the aggregator
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn payments_usage(&self, subscriber_id: &str) -> Result<Map<String, Value>, ClientError>;

    async fn storage_usage(&self) -> Result<StorageUsage, ClientError>;

    async fn analytics_report(&self, query: &ReportQuery) -> Result<ColumnarReport, ClientError>;
}

/// Facade over the payments, storage and analytics providers
pub struct ExternalApiClient {
    payments: PaymentsClient,
    webhooks: WebhookVerifier,
    storage: StorageClient,
    analytics: AnalyticsClient,
}

impl ExternalApiClient {
    pub fn new(
        payments: PaymentsClient,
        webhooks: WebhookVerifier,
        storage: StorageClient,
        analytics: AnalyticsClient,
    ) -> Self {
        Self {
            payments,
            webhooks,
            storage,
            analytics,
        }
    }

    /// Build every sub-client from settings
    pub fn from_settings(settings: &Settings) -> Self {
        let timeout = settings.timeouts.request();
        Self::new(
            PaymentsClient::new(&settings.payments, timeout),
            WebhookVerifier::new(
                settings.payments.webhook_secret.clone(),
                settings.payments.webhook_tolerance_secs,
            ),
            StorageClient::new(&settings.storage, timeout),
            AnalyticsClient::new(&settings.analytics, timeout),
        )
    }

    /// Verify a webhook delivery and classify its event
    pub fn handle_payment_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<EventOutcome, ClientError> {
        let event = self
            .webhooks
            .verify(raw_body, signature_header)
            .map_err(map_webhook_error)?;

        let outcome = EventOutcome::from(&event);
        match &outcome {
            EventOutcome::PaymentSucceeded(id) => {
                tracing::info!(event_id = %id, event_type = %event.event_type, "Payment succeeded");
            }
            EventOutcome::Other(event_type) => {
                tracing::info!(event_id = %event.id, event_type = %event_type, "Webhook event received");
            }
        }
        Ok(outcome)
    }

    /// Recent payouts for the account behind the payments key
    pub async fn get_payments_usage(&self, subscriber_id: &str) -> Result<Map<String, Value>, ClientError> {
        tracing::debug!(subscriber_id, "Fetching payouts");
        self.payments.list_payouts().await.map_err(map_payments_error)
    }

    /// Buckets and region visible to the storage credentials
    pub async fn get_storage_usage(&self) -> Result<StorageUsage, ClientError> {
        tracing::debug!(region = self.storage.region(), "Listing storage buckets");
        self.storage.list_buckets().await.map_err(map_storage_error)
    }

    /// Run a report for `property_id` over `date_range`
    pub async fn get_analytics_report(
        &self,
        property_id: &str,
        date_range: DateRange,
        metrics: &[String],
        dimensions: &[String],
    ) -> Result<ColumnarReport, ClientError> {
        let query = build_query(property_id, date_range, metrics, dimensions)?;
        self.run_query(&query).await
    }

    async fn run_query(&self, query: &ReportQuery) -> Result<ColumnarReport, ClientError> {
        self.analytics
            .run_report(query)
            .await
            .map_err(|e| map_analytics_error(&query.property_id, e))
    }
}

#[async_trait]
impl UsageSource for ExternalApiClient {
    async fn payments_usage(&self, subscriber_id: &str) -> Result<Map<String, Value>, ClientError> {
        self.get_payments_usage(subscriber_id).await
    }

    async fn storage_usage(&self) -> Result<StorageUsage, ClientError> {
        self.get_storage_usage().await
    }

    async fn analytics_report(&self, query: &ReportQuery) -> Result<ColumnarReport, ClientError> {
        self.run_query(query).await
    }
}

/// Validate report parameters into a query
pub fn build_query(
    property_id: &str,
    date_range: DateRange,
    metrics: &[String],
    dimensions: &[String],
) -> Result<ReportQuery, ClientError> {
    let normalized = normalize_property_id(property_id).ok_or_else(|| ClientError::InvalidProperty {
        property_id: property_id.to_string(),
        reason: "property id must be a non-empty identifier".to_string(),
    })?;

    if date_range.start_date() > date_range.end_date() {
        return Err(ClientError::InvalidRequest(format!(
            "start date {} is after end date {}",
            date_range.start(),
            date_range.end()
        )));
    }

    if metrics.is_empty() {
        return Err(ClientError::InvalidRequest(
            "at least one metric is required".to_string(),
        ));
    }

    Ok(ReportQuery {
        property_id: normalized,
        date_range,
        metrics: metrics.to_vec(),
        dimensions: dimensions.to_vec(),
    })
}

fn map_webhook_error(err: WebhookError) -> ClientError {
    tracing::warn!(provider = %ProviderKind::Payments, error = %err, "Webhook rejected");
    if err.is_signature_error() {
        ClientError::SignatureInvalid(err.to_string())
    } else {
        ClientError::MalformedPayload(err.to_string())
    }
}

fn map_payments_error(err: PaymentsError) -> ClientError {
    tracing::error!(provider = %ProviderKind::Payments, error = %err, "Payments request failed");
    match err {
        PaymentsError::Parse(reason) => ClientError::malformed(ProviderKind::Payments, reason),
        other => ClientError::unavailable(ProviderKind::Payments, other.to_string()),
    }
}

fn map_storage_error(err: StorageError) -> ClientError {
    tracing::error!(provider = %ProviderKind::Storage, error = %err, "Storage request failed");
    match err {
        StorageError::Parse(reason) => ClientError::malformed(ProviderKind::Storage, reason),
        other => ClientError::unavailable(ProviderKind::Storage, other.to_string()),
    }
}

fn map_analytics_error(property_id: &str, err: AnalyticsError) -> ClientError {
    tracing::error!(
        provider = %ProviderKind::Analytics,
        property_id,
        error = %err,
        "Analytics request failed"
    );
    match err {
        AnalyticsError::PropertyRejected { message, .. } => ClientError::InvalidProperty {
            property_id: property_id.to_string(),
            reason: message,
        },
        AnalyticsError::BadRequest(message) => ClientError::InvalidRequest(message),
        AnalyticsError::Parse(reason) => ClientError::malformed(ProviderKind::Analytics, reason),
        other => ClientError::unavailable(ProviderKind::Analytics, other.to_string()),
    }
}
