//! Command-line interface

pub mod providers;
pub mod usage;
pub mod webhook;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

/// Exit codes returned by the binary
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const PROVIDER_UNAVAILABLE: i32 = 2;
    pub const PARSE_ERROR: i32 = 3;
    pub const SIGNATURE_INVALID: i32 = 4;
    pub const SINK_WRITE_FAILED: i32 = 5;
}

#[derive(Debug, Parser)]
#[command(name = "usage-collector", version, about = "Collect per-subscriber usage from payments, storage and analytics providers")]
pub struct Cli {
    /// Settings file (defaults to <config dir>/usage-collector/config.toml)
    #[arg(long, global = true, env = "USAGE_COLLECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Collect a usage record for one subscriber
    Usage(usage::UsageArgs),
    /// Show storage buckets and region
    Storage,
    /// Run an analytics report for a property
    Analytics(providers::AnalyticsArgs),
    /// Verify a webhook delivery and print its outcome
    Webhook(webhook::WebhookArgs),
}

/// Load settings from the CLI's config path and the environment
pub fn load_settings(cli_config: Option<&std::path::Path>) -> anyhow::Result<Settings> {
    let settings = Settings::load(cli_config)?;
    let missing = settings.missing_credentials();
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Some provider credentials are not configured");
    }
    Ok(settings)
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
