//! `usage` command: collect one subscriber's usage record

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregator::{AnalyticsQueryTemplate, UsageAggregator};
use crate::client::ExternalApiClient;
use crate::config::Settings;
use crate::sink::JsonLinesSink;

use super::providers::resolve_date_range;

#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Subscriber (application) id
    pub subscriber_id: String,

    /// Analytics property id (defaults to the subscriber id)
    #[arg(long)]
    pub property: Option<String>,

    /// First day of the analytics window (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the analytics window (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Analytics metric; repeat for several
    #[arg(long = "metric")]
    pub metrics: Vec<String>,

    /// Analytics dimension; repeat for several
    #[arg(long = "dimension")]
    pub dimensions: Vec<String>,

    /// Append the record to this JSON-lines file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: UsageArgs, settings: Settings) -> anyhow::Result<()> {
    let mut template = AnalyticsQueryTemplate::from_settings(&settings);
    template.property_id = args.property;
    template.date_range = resolve_date_range(args.start, args.end, &settings)?;
    if !args.metrics.is_empty() {
        template.metrics = args.metrics;
    }
    if !args.dimensions.is_empty() {
        template.dimensions = args.dimensions;
    }

    let client = Arc::new(ExternalApiClient::from_settings(&settings));
    let mut aggregator = UsageAggregator::new(client, template, settings.timeouts.call());
    if let Some(path) = args.output {
        aggregator = aggregator.with_sink(Arc::new(JsonLinesSink::new(path)));
    }

    let record = aggregator
        .collect(&args.subscriber_id)
        .await
        .with_context(|| format!("Failed to collect usage for {}", args.subscriber_id))?;

    super::print_json(&record)
}
