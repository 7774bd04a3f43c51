//! Provisioning API key wrapper

use std::fmt;
use zeroize::Zeroize;

/// API key for an HTTP provisioning endpoint.
///
/// Redacted in Debug/Display so it never reaches logs, and wiped from memory
/// when dropped.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key value, only for building the Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Bearer <key>` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for ApiKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
