//! Core data models and the client error taxonomy

mod error;
mod provider_result;
mod secret;
mod usage_record;

pub use error::*;
pub use provider_result::*;
pub use secret::*;
pub use usage_record::*;
