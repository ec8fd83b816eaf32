//! Settings: provider credentials, endpoints and timeouts
//!
//! Loaded once at startup from an optional TOML file, then overlaid with
//! environment variables. Never mutated afterwards.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::Secret;

pub const DEFAULT_PAYMENTS_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_ANALYTICS_BASE_URL: &str = "https://analyticsdata.googleapis.com";
pub const DEFAULT_REGION: &str = "us-east-1";

const CONFIG_DIR_NAME: &str = "usage-collector";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Payments provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentsSettings {
    pub api_key: Secret,
    pub webhook_secret: Secret,
    pub base_url: String,
    /// Maximum payouts returned per usage fetch
    pub payouts_limit: u32,
    /// Maximum age of a webhook signature timestamp
    pub webhook_tolerance_secs: u64,
}

impl Default for PaymentsSettings {
    fn default() -> Self {
        Self {
            api_key: Secret::default(),
            webhook_secret: Secret::default(),
            base_url: DEFAULT_PAYMENTS_BASE_URL.to_string(),
            payouts_limit: 10,
            webhook_tolerance_secs: 300,
        }
    }
}

/// Object storage provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub access_key_id: Secret,
    pub secret_key: Secret,
    pub region: String,
    /// Overrides the regional endpoint, e.g. for S3-compatible stores
    pub endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            access_key_id: Secret::default(),
            secret_key: Secret::default(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
        }
    }
}

impl StorageSettings {
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}

/// Analytics provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub api_key: Secret,
    pub base_url: String,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    /// Length of the default reporting window ending today
    pub lookback_days: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            api_key: Secret::default(),
            base_url: DEFAULT_ANALYTICS_BASE_URL.to_string(),
            metrics: vec!["activeUsers".to_string()],
            dimensions: vec!["date".to_string()],
            lookback_days: 30,
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub payments: PaymentsSettings,
    pub storage: StorageSettings,
    pub analytics: AnalyticsSettings,
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// HTTP request timeout applied by every provider client
    pub request_secs: u64,
    /// Upper bound on one provider fetch inside an aggregate collection
    pub call_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            request_secs: 30,
            call_secs: 30,
        }
    }
}

impl TimeoutSettings {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load settings from `path` (or the default location) and apply
    /// environment overrides. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from the environment. The first non-empty variable
    /// of each group wins.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = first(&["PAYMENTS_API_KEY", "STRIPE_API_KEY"]) {
            self.payments.api_key = Secret::new(v);
        }
        if let Some(v) = first(&["PAYMENTS_WEBHOOK_SECRET", "STRIPE_WEBHOOK_SECRET"]) {
            self.payments.webhook_secret = Secret::new(v);
        }
        if let Some(v) = first(&["STORAGE_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"]) {
            self.storage.access_key_id = Secret::new(v);
        }
        if let Some(v) = first(&["STORAGE_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]) {
            self.storage.secret_key = Secret::new(v);
        }
        if let Some(v) = first(&["STORAGE_REGION", "AWS_REGION"]) {
            self.storage.region = v;
        }
        if let Some(v) = first(&["STORAGE_ENDPOINT"]) {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = first(&["ANALYTICS_API_KEY", "GA_API_KEY"]) {
            self.analytics.api_key = Secret::new(v);
        }
    }

    /// Names of credentials that are still unset
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.payments.api_key.is_empty() {
            missing.push("paymentsApiKey");
        }
        if self.storage.access_key_id.is_empty() {
            missing.push("storageAccessKeyId");
        }
        if self.storage.secret_key.is_empty() {
            missing.push("storageSecretKey");
        }
        if self.analytics.api_key.is_empty() {
            missing.push("analyticsApiKey");
        }
        missing
    }
}
