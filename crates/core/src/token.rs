//! Session token pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the backend.
///
/// Tokens are opaque strings at this layer; the client stores and forwards
/// them without inspecting the contents. Expiry is whatever the backend
/// reported alongside the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the access token is past (or within `margin` seconds of) its
    /// reported expiry. Pairs without expiry metadata are never considered
    /// expired; the 401 path handles them.
    pub fn is_expired(&self, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() + chrono::Duration::seconds(margin_secs) >= at,
            None => false,
        }
    }
}
