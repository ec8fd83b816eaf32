//! `webhook` command: verify a delivery captured to a file

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use crate::client::ExternalApiClient;
use crate::config::Settings;

#[derive(Debug, Args)]
pub struct WebhookArgs {
    /// File holding the raw request body, byte for byte
    #[arg(long)]
    pub body: PathBuf,

    /// Value of the signature header
    #[arg(long)]
    pub signature: String,
}

pub async fn run(args: WebhookArgs, settings: Settings) -> anyhow::Result<()> {
    let raw_body = tokio::fs::read(&args.body)
        .await
        .with_context(|| format!("Failed to read webhook body from {}", args.body.display()))?;

    let client = ExternalApiClient::from_settings(&settings);
    let outcome = client.handle_payment_webhook(&raw_body, &args.signature)?;
    super::print_json(&outcome)
}
