//! Usage record - merged per-subscriber snapshot across all providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProviderKind, ProviderResult};

/// Snapshot of one subscriber's usage at a point in time.
///
/// Every slot is mandatory, so a record can only exist once all three
/// providers have resolved to either a success or a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub subscriber_id: String,
    pub payments: ProviderResult,
    pub storage: ProviderResult,
    pub analytics: ProviderResult,
    pub collected_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        subscriber_id: impl Into<String>,
        payments: ProviderResult,
        storage: ProviderResult,
        analytics: ProviderResult,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            payments,
            storage,
            analytics,
            collected_at: Utc::now(),
        }
    }

    pub fn slot(&self, provider: ProviderKind) -> &ProviderResult {
        match provider {
            ProviderKind::Payments => &self.payments,
            ProviderKind::Storage => &self.storage,
            ProviderKind::Analytics => &self.analytics,
        }
    }

    /// Providers whose slot holds a failure
    pub fn failed_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|p| self.slot(*p).is_failure())
            .collect()
    }
}
