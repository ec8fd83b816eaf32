//! Usage aggregation
//!
//! Fans out the three provider fetches for one subscriber, isolates each
//! provider's failure in its own slot, and assembles a [`UsageRecord`].

use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{build_query, UsageSource};
use crate::config::Settings;
use crate::core::{ClientError, ProviderKind, ProviderResult, UsageRecord};
use crate::providers::analytics::{DateRange, ReportQuery};
use crate::sink::UsageSink;

/// Parameters for the analytics query issued per subscriber
#[derive(Debug, Clone)]
pub struct AnalyticsQueryTemplate {
    /// Fixed property id; when unset the subscriber id is used as the property id
    pub property_id: Option<String>,
    pub date_range: DateRange,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
}

impl AnalyticsQueryTemplate {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            property_id: None,
            date_range: DateRange::trailing_days(settings.analytics.lookback_days.max(1)),
            metrics: settings.analytics.metrics.clone(),
            dimensions: settings.analytics.dimensions.clone(),
        }
    }

    pub fn query_for(&self, subscriber_id: &str) -> Result<ReportQuery, ClientError> {
        let property_id = self.property_id.as_deref().unwrap_or(subscriber_id);
        build_query(property_id, self.date_range, &self.metrics, &self.dimensions)
    }
}

/// Collects one usage record per subscriber per invocation
pub struct UsageAggregator {
    source: Arc<dyn UsageSource>,
    sink: Option<Arc<dyn UsageSink>>,
    template: AnalyticsQueryTemplate,
    call_timeout: Duration,
}

impl UsageAggregator {
    pub fn new(source: Arc<dyn UsageSource>, template: AnalyticsQueryTemplate, call_timeout: Duration) -> Self {
        Self {
            source,
            sink: None,
            template,
            call_timeout,
        }
    }

    /// Builder pattern: persist collected records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fetch all three providers. Never fails: a provider error becomes a
    /// failure slot and the remaining providers still run.
    pub async fn fetch(&self, subscriber_id: &str) -> UsageRecord {
        tracing::info!(subscriber_id, "Collecting usage");

        let (payments, storage, analytics) = tokio::join!(
            self.isolate(ProviderKind::Payments, self.fetch_payments(subscriber_id)),
            self.isolate(ProviderKind::Storage, self.fetch_storage()),
            self.isolate(ProviderKind::Analytics, self.fetch_analytics(subscriber_id)),
        );

        let record = UsageRecord::new(subscriber_id, payments, storage, analytics);
        let failed = record.failed_providers();
        if failed.is_empty() {
            tracing::info!(subscriber_id, "Usage collected from all providers");
        } else {
            tracing::warn!(subscriber_id, failed = ?failed, "Usage collected with provider failures");
        }
        record
    }

    /// Fetch, then hand the record to the sink when one is configured
    pub async fn collect(&self, subscriber_id: &str) -> Result<UsageRecord, ClientError> {
        let record = self.fetch(subscriber_id).await;

        if let Some(sink) = &self.sink {
            sink.save(&record).await.map_err(|e| {
                tracing::error!(subscriber_id, error = %e, "Failed to store usage record");
                ClientError::SinkWriteFailed(e.to_string())
            })?;
        }

        Ok(record)
    }

    async fn isolate<F>(&self, provider: ProviderKind, fetch: F) -> ProviderResult
    where
        F: Future<Output = Result<Map<String, Value>, ClientError>>,
    {
        match tokio::time::timeout(self.call_timeout, fetch).await {
            Ok(Ok(payload)) => ProviderResult::success(payload),
            Ok(Err(e)) => {
                tracing::warn!(provider = %provider, kind = e.kind(), error = %e, "Provider fetch failed");
                ProviderResult::failure(e.to_string())
            }
            Err(_) => {
                tracing::warn!(provider = %provider, timeout_secs = self.call_timeout.as_secs(), "Provider fetch timed out");
                ProviderResult::failure(format!(
                    "{} fetch timed out after {:?}",
                    provider, self.call_timeout
                ))
            }
        }
    }

    async fn fetch_payments(&self, subscriber_id: &str) -> Result<Map<String, Value>, ClientError> {
        self.source.payments_usage(subscriber_id).await
    }

    async fn fetch_storage(&self) -> Result<Map<String, Value>, ClientError> {
        let usage = self.source.storage_usage().await?;

        let mut payload = Map::new();
        payload.insert(
            "buckets".to_string(),
            Value::Array(usage.buckets.into_iter().map(Value::String).collect()),
        );
        payload.insert("region".to_string(), Value::String(usage.region));
        Ok(payload)
    }

    async fn fetch_analytics(&self, subscriber_id: &str) -> Result<Map<String, Value>, ClientError> {
        let query = self.template.query_for(subscriber_id)?;
        let report = self.source.analytics_report(&query).await?;

        let records = report
            .records()
            .map_err(|e| ClientError::malformed(ProviderKind::Analytics, e.to_string()))?;
        tracing::info!(property_id = %query.property_id, rows = records.len(), "Processed analytics rows");

        let mut payload = Map::new();
        payload.insert("propertyId".to_string(), Value::String(query.property_id));
        payload.insert("startDate".to_string(), Value::String(query.date_range.start()));
        payload.insert("endDate".to_string(), Value::String(query.date_range.end()));
        payload.insert(
            "rows".to_string(),
            Value::Array(records.into_iter().map(Value::Object).collect()),
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::analytics::ColumnarReport;
    use crate::providers::storage::StorageUsage;
    use crate::sink::{MemorySink, SinkError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted usage source; each field decides the outcome of one provider
    struct StubSource {
        payments_fails: bool,
        storage_fails: bool,
        analytics_report: Result<ColumnarReport, String>,
        storage_delay: Option<Duration>,
        queries: Mutex<Vec<ReportQuery>>,
    }

    impl StubSource {
        fn healthy() -> Self {
            Self {
                payments_fails: false,
                storage_fails: false,
                analytics_report: Ok(ColumnarReport {
                    column_headers: vec!["date".to_string(), "activeUsers".to_string()],
                    rows: vec![
                        vec!["2023-01-01".to_string(), "10".to_string()],
                        vec!["2023-01-02".to_string(), "12".to_string()],
                    ],
                }),
                storage_delay: None,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UsageSource for StubSource {
        async fn payments_usage(&self, _subscriber_id: &str) -> Result<Map<String, Value>, ClientError> {
            if self.payments_fails {
                return Err(ClientError::unavailable(ProviderKind::Payments, "401 Unauthorized"));
            }
            let mut payload = Map::new();
            payload.insert("object".to_string(), json!("list"));
            payload.insert("data".to_string(), json!([{"id": "po_1"}]));
            Ok(payload)
        }

        async fn storage_usage(&self) -> Result<StorageUsage, ClientError> {
            if let Some(delay) = self.storage_delay {
                tokio::time::sleep(delay).await;
            }
            if self.storage_fails {
                return Err(ClientError::unavailable(ProviderKind::Storage, "InvalidAccessKeyId"));
            }
            Ok(StorageUsage {
                buckets: vec!["assets".to_string()],
                region: "us-east-1".to_string(),
            })
        }

        async fn analytics_report(&self, query: &ReportQuery) -> Result<ColumnarReport, ClientError> {
            self.queries.lock().unwrap().push(query.clone());
            self.analytics_report.clone().map_err(|reason| ClientError::InvalidProperty {
                property_id: query.property_id.clone(),
                reason,
            })
        }
    }

    struct FailingSink;

    #[async_trait]
    impl UsageSink for FailingSink {
        async fn save(&self, _record: &UsageRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("disk full".to_string()))
        }
    }

    fn template() -> AnalyticsQueryTemplate {
        AnalyticsQueryTemplate {
            property_id: None,
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            )
            .unwrap(),
            metrics: vec!["activeUsers".to_string()],
            dimensions: vec!["date".to_string()],
        }
    }

    fn aggregator(source: StubSource) -> UsageAggregator {
        UsageAggregator::new(Arc::new(source), template(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_all_success() {
        let record = aggregator(StubSource::healthy()).fetch("4242").await;

        assert_eq!(record.subscriber_id, "4242");
        assert!(record.failed_providers().is_empty());
        assert_eq!(record.payments.payload().unwrap()["data"][0]["id"], "po_1");
        assert_eq!(
            Value::Object(record.storage.payload().unwrap().clone()),
            json!({"buckets": ["assets"], "region": "us-east-1"})
        );
        assert_eq!(
            Value::Object(record.analytics.payload().unwrap().clone()),
            json!({
                "propertyId": "4242",
                "startDate": "2023-01-01",
                "endDate": "2023-12-31",
                "rows": [
                    {"date": "2023-01-01", "activeUsers": "10"},
                    {"date": "2023-01-02", "activeUsers": "12"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_each_single_failure_is_isolated() {
        for failing in ProviderKind::ALL {
            let mut source = StubSource::healthy();
            match failing {
                ProviderKind::Payments => source.payments_fails = true,
                ProviderKind::Storage => source.storage_fails = true,
                ProviderKind::Analytics => source.analytics_report = Err("unknown property".to_string()),
            }

            let record = aggregator(source).fetch("4242").await;

            assert_eq!(record.failed_providers(), vec![failing]);
            let successes = ProviderKind::ALL
                .into_iter()
                .filter(|p| record.slot(*p).is_success())
                .count();
            assert_eq!(successes, 2);
        }
    }

    #[tokio::test]
    async fn test_storage_failure_reason_recorded() {
        let mut source = StubSource::healthy();
        source.storage_fails = true;

        let record = aggregator(source).fetch("4242").await;
        assert_eq!(
            record.storage.reason(),
            Some("storage provider unavailable: InvalidAccessKeyId")
        );
    }

    #[tokio::test]
    async fn test_malformed_analytics_rows() {
        let mut source = StubSource::healthy();
        source.analytics_report = Ok(ColumnarReport {
            column_headers: vec!["date".to_string(), "activeUsers".to_string()],
            rows: vec![vec!["2023-01-01".to_string()]],
        });

        let record = aggregator(source).fetch("4242").await;
        let reason = record.analytics.reason().unwrap();
        assert!(reason.starts_with("Malformed analytics response"), "{}", reason);
        assert!(record.payments.is_success());
        assert!(record.storage.is_success());
    }

    #[tokio::test]
    async fn test_invalid_subscriber_property_fails_analytics_only() {
        let record = aggregator(StubSource::healthy()).fetch("not a property").await;
        assert_eq!(record.failed_providers(), vec![ProviderKind::Analytics]);
    }

    #[tokio::test]
    async fn test_fixed_property_id() {
        let source = Arc::new(StubSource::healthy());
        let mut template = template();
        template.property_id = Some("properties/777".to_string());
        let aggregator = UsageAggregator::new(source.clone(), template, Duration::from_secs(5));

        aggregator.fetch("app-1").await;

        let queries = source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].property_id, "777");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let mut source = StubSource::healthy();
        source.storage_delay = Some(Duration::from_secs(60));
        let aggregator = UsageAggregator::new(Arc::new(source), template(), Duration::from_secs(1));

        let record = aggregator.fetch("4242").await;
        assert_eq!(record.failed_providers(), vec![ProviderKind::Storage]);
        assert!(record.storage.reason().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_collect_persists_record() {
        let sink = Arc::new(MemorySink::new());
        let aggregator = aggregator(StubSource::healthy()).with_sink(sink.clone());

        let record = aggregator.collect("4242").await.unwrap();

        assert_eq!(sink.records(), vec![record]);
    }

    #[tokio::test]
    async fn test_collect_sink_failure() {
        let aggregator = aggregator(StubSource::healthy()).with_sink(Arc::new(FailingSink));

        assert!(matches!(
            aggregator.collect("4242").await,
            Err(ClientError::SinkWriteFailed(_))
        ));
    }
}
