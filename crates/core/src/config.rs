//! Environment-driven client configuration.
//!
//! Read once at startup. Every value has a development default so the client
//! starts against a local provider with no environment at all.

use std::time::Duration;

/// Runtime configuration shared by the client crates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Application API base URL (non-provider endpoints).
    pub api_url: String,
    /// Backend provider base URL (auth/rest/storage live under it).
    pub provider_url: String,
    /// Provider anon/publishable key, sent as the `apikey` header.
    pub provider_key: String,
    pub documents_bucket: String,
    pub avatars_bucket: String,
    pub registration_enabled: bool,
    pub two_factor_enabled: bool,
    /// Idle time before the session is considered abandoned.
    pub idle_timeout: Duration,
    /// Warning lead time before `idle_timeout` elapses.
    pub idle_warning: Duration,
}

impl Config {
    /// Load configuration from `MILVAULT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let provider_key = lookup("MILVAULT_PROVIDER_KEY").unwrap_or_else(|| {
            tracing::warn!("MILVAULT_PROVIDER_KEY not set; using insecure dev default");
            "dev-anon-key".to_string()
        });

        Self {
            api_url: lookup("MILVAULT_API_URL")
                .unwrap_or_else(|| "http://localhost:3000/api".to_string()),
            provider_url: lookup("MILVAULT_PROVIDER_URL")
                .unwrap_or_else(|| "http://localhost:54321".to_string()),
            provider_key,
            documents_bucket: lookup("MILVAULT_DOCUMENTS_BUCKET")
                .unwrap_or_else(|| "documents".to_string()),
            avatars_bucket: lookup("MILVAULT_AVATARS_BUCKET")
                .unwrap_or_else(|| "avatars".to_string()),
            registration_enabled: parse_bool(
                "MILVAULT_REGISTRATION_ENABLED",
                lookup("MILVAULT_REGISTRATION_ENABLED"),
                true,
            ),
            two_factor_enabled: parse_bool(
                "MILVAULT_TWO_FACTOR_ENABLED",
                lookup("MILVAULT_TWO_FACTOR_ENABLED"),
                false,
            ),
            idle_timeout: parse_secs(
                "MILVAULT_IDLE_TIMEOUT_SECS",
                lookup("MILVAULT_IDLE_TIMEOUT_SECS"),
                1800,
            ),
            idle_warning: parse_secs(
                "MILVAULT_IDLE_WARNING_SECS",
                lookup("MILVAULT_IDLE_WARNING_SECS"),
                300,
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> bool {
    match raw.as_deref() {
        None => default,
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        Some(other) => {
            tracing::warn!(%key, value = %other, "unparseable boolean, using default");
            default
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>, default_secs: u64) -> Duration {
    let secs = match raw {
        None => default_secs,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(%key, value = %raw, "unparseable seconds, using default");
            default_secs
        }),
    };
    Duration::from_secs(secs)
}
