//! Military-ID verification over the provider RPC surface.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ProviderError;
use crate::table::TableApi;

/// Repeat lookups inside this window are served locally.
const CACHE_TTL_MINUTES: i64 = 5;

/// Lookup request for a service member record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub military_id: String,
    pub last_name: Option<String>,
}

impl VerificationRequest {
    pub fn new(military_id: impl Into<String>) -> Self {
        Self {
            military_id: military_id.into(),
            last_name: None,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}",
            self.military_id,
            self.last_name.as_deref().unwrap_or_default()
        )
    }
}

/// Verification verdict from the registry function.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MilitaryVerification {
    pub is_valid: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<VerificationDetails>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct VerifyArgs<'a> {
    military_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct CachedVerification {
    response: MilitaryVerification,
    fetched_at: DateTime<Utc>,
}

/// Client for the `verify_military_id` database function, with a short
/// in-memory cache of positive results.
#[derive(Debug, Clone)]
pub struct VerificationApi {
    tables: TableApi,
    cache: Arc<Mutex<HashMap<String, CachedVerification>>>,
}

impl VerificationApi {
    pub(crate) fn new(tables: TableApi) -> Self {
        Self {
            tables,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Verify a military ID, serving fresh repeats from cache.
    ///
    /// Only valid verdicts are cached; rejections always re-query.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<MilitaryVerification, ProviderError> {
        let key = request.cache_key();

        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if is_fresh(entry.fetched_at, Utc::now()) {
                    tracing::debug!(military_id = %request.military_id, "verification served from cache");
                    return Ok(entry.response.clone());
                }
            }
        }

        let args = VerifyArgs {
            military_id: &request.military_id,
            last_name: request.last_name.as_deref(),
        };
        let response: MilitaryVerification = self.tables.rpc("verify_military_id", &args).await?;

        if response.is_valid {
            let mut cache = self.cache.lock().await;
            cache.insert(
                key,
                CachedVerification {
                    response: response.clone(),
                    fetched_at: Utc::now(),
                },
            );
        }

        Ok(response)
    }

    /// Drop all cached verdicts.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(fetched_at) < Duration::minutes(CACHE_TTL_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_include_the_last_name() {
        let bare = VerificationRequest::new("MIL-1");
        let named = VerificationRequest::new("MIL-1").with_last_name("Doe");
        assert_ne!(bare.cache_key(), named.cache_key());
        assert_eq!(bare.cache_key(), "MIL-1|");
    }

    #[test]
    fn freshness_window_is_five_minutes() {
        let now = Utc::now();
        assert!(is_fresh(now - Duration::minutes(4), now));
        assert!(!is_fresh(now - Duration::minutes(5), now));
    }

    #[test]
    fn verification_payload_parses_camel_case() {
        let json = r#"{
            "isValid": true,
            "message": "Record found",
            "data": {"rank": "sergeant", "unit": "3rd Battalion", "isActive": true}
        }"#;
        let v: MilitaryVerification = serde_json::from_str(json).unwrap();
        assert!(v.is_valid);
        let data = v.data.unwrap();
        assert_eq!(data.rank.as_deref(), Some("sergeant"));
        assert!(data.is_active);
        assert_eq!(data.expiration_date, None);
    }
}
