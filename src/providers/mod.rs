//! Provider sub-clients
//!
//! Each provider owns its HTTP client, wire types and error enum. Errors
//! are translated into [`crate::core::ClientError`] by the external client.

pub mod analytics;
pub mod payments;
pub mod storage;

pub use analytics::AnalyticsClient;
pub use payments::{PaymentsClient, WebhookVerifier};
pub use storage::StorageClient;
