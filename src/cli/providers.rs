//! `storage` and `analytics` commands: query a single provider

use chrono::NaiveDate;
use clap::Args;

use crate::client::ExternalApiClient;
use crate::config::Settings;
use crate::core::ClientError;
use crate::providers::analytics::DateRange;

#[derive(Debug, Args)]
pub struct AnalyticsArgs {
    /// Analytics property id
    pub property_id: String,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Metric; repeat for several
    #[arg(long = "metric")]
    pub metrics: Vec<String>,

    /// Dimension; repeat for several
    #[arg(long = "dimension")]
    pub dimensions: Vec<String>,

    /// Print row-records instead of the columnar report
    #[arg(long)]
    pub records: bool,
}

/// Combine optional CLI dates with the configured lookback window
pub fn resolve_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    settings: &Settings,
) -> Result<DateRange, ClientError> {
    let default = DateRange::trailing_days(settings.analytics.lookback_days.max(1));
    let start = start.unwrap_or(default.start_date());
    let end = end.unwrap_or(default.end_date());
    DateRange::new(start, end).ok_or_else(|| {
        ClientError::InvalidRequest(format!("start date {} is after end date {}", start, end))
    })
}

pub async fn run_storage(settings: Settings) -> anyhow::Result<()> {
    let client = ExternalApiClient::from_settings(&settings);
    let usage = client.get_storage_usage().await?;
    super::print_json(&usage)
}

pub async fn run_analytics(args: AnalyticsArgs, settings: Settings) -> anyhow::Result<()> {
    let date_range = resolve_date_range(args.start, args.end, &settings)?;
    let metrics = if args.metrics.is_empty() {
        settings.analytics.metrics.clone()
    } else {
        args.metrics
    };
    let dimensions = if args.dimensions.is_empty() {
        settings.analytics.dimensions.clone()
    } else {
        args.dimensions
    };

    let client = ExternalApiClient::from_settings(&settings);
    let report = client
        .get_analytics_report(&args.property_id, date_range, &metrics, &dimensions)
        .await?;

    if args.records {
        let records = report.records().map_err(|e| {
            ClientError::malformed(crate::core::ProviderKind::Analytics, e.to_string())
        })?;
        super::print_json(&records)
    } else {
        super::print_json(&report)
    }
}
