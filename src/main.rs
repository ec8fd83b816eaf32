//! usage-collector - per-subscriber usage collection across external providers
//!
//! Wraps three vendor APIs behind one client:
//! - Payments: payout listing and signed webhook verification
//! - Storage: bucket listing over the S3-compatible API
//! - Analytics: report queries against the analytics Data API
//!
//! and merges their results into one usage record per subscriber.

mod aggregator;
mod cli;
mod client;
mod config;
mod core;
mod logging;
mod providers;
mod sink;

use clap::Parser;
use cli::{exit_codes, Cli, Commands};

use crate::core::{redact_sensitive_args, ClientError};

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.json_output, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let args: Vec<String> = std::env::args().collect();
    tracing::debug!(args = ?redact_sensitive_args(&args), "Starting");

    let settings = match cli::load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_codes::PARSE_ERROR;
        }
    };

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Usage(args) => cli::usage::run(args, settings).await,
            Commands::Storage => cli::providers::run_storage(settings).await,
            Commands::Analytics(args) => cli::providers::run_analytics(args, settings).await,
            Commands::Webhook(args) => cli::webhook::run(args, settings).await,
        }
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            categorize_error(&e)
        }
    }
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    let client_error = e.chain().find_map(|cause| cause.downcast_ref::<ClientError>());

    match client_error {
        Some(ClientError::ProviderUnavailable { .. }) => exit_codes::PROVIDER_UNAVAILABLE,
        Some(ClientError::SignatureInvalid(_)) => exit_codes::SIGNATURE_INVALID,
        Some(ClientError::SinkWriteFailed(_)) => exit_codes::SINK_WRITE_FAILED,
        Some(
            ClientError::MalformedPayload(_)
            | ClientError::MalformedResponse { .. }
            | ClientError::InvalidProperty { .. }
            | ClientError::InvalidRequest(_),
        ) => exit_codes::PARSE_ERROR,
        None => exit_codes::UNEXPECTED_FAILURE,
    }
}
