//! Credential wrapper that never prints its contents

use serde::Deserialize;
use std::fmt;

/// Placeholder printed in place of secret values
pub const REDACTED: &str = "[REDACTED]";

/// A credential value. `Debug` and `Display` are redacted so settings can
/// be logged without leaking keys. It can be read from config but not
/// serialized back out.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only call this when handing the value to a vendor.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Redact sensitive CLI arguments (keys, secrets, signatures) from log output
pub fn redact_sensitive_args(args: &[String]) -> Vec<String> {
    let sensitive_flags = ["--api-key", "--secret", "--key", "--signature", "--token"];
    let mut result = Vec::with_capacity(args.len());
    let mut redact_next = false;
    for arg in args {
        if redact_next {
            result.push(REDACTED.to_string());
            redact_next = false;
        } else if sensitive_flags.iter().any(|f| arg.starts_with(f)) {
            if let Some((prefix, _)) = arg.split_once('=') {
                result.push(format!("{}={}", prefix, REDACTED));
            } else {
                result.push(arg.clone());
                redact_next = true;
            }
        } else {
            result.push(arg.clone());
        }
    }
    result
}
