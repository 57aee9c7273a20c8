//! Wire shapes for the provider's auth surface.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use milvault_core::{Rank, Role, TokenPair, User, UserId};

/// Session payload returned by sign-in, refresh and auto-confirm sign-up.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp (seconds); present on newer provider versions.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: ProviderUser,
}

impl AuthSession {
    pub fn token_pair(&self) -> TokenPair {
        let pair = TokenPair::new(self.access_token.clone(), self.refresh_token.clone());
        let expiry = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        match expiry {
            Some(at) => pair.with_expiry(at),
            None => pair,
        }
    }

    pub fn into_parts(self) -> (TokenPair, User) {
        let pair = self.token_pair();
        (pair, self.user.into_user())
    }
}

/// Account record as the provider returns it.
///
/// Profile attributes live in `user_metadata`; everything there is
/// best-effort because older accounts may predate individual fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl ProviderUser {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some() || self.confirmed_at.is_some()
    }

    /// Map the wire record into the client's [`User`] model.
    ///
    /// Accounts with no role metadata read as [`Role::Personnel`]; an
    /// unparseable rank reads as no rank rather than failing the session.
    pub fn into_user(self) -> User {
        let verified = self.is_confirmed();
        let meta = &self.user_metadata;

        let phone = self
            .phone
            .filter(|p| !p.is_empty())
            .or_else(|| meta_string(meta, "phone"));

        User {
            id: self.id,
            email: self.email.unwrap_or_default(),
            first_name: meta_string(meta, "first_name").unwrap_or_default(),
            last_name: meta_string(meta, "last_name").unwrap_or_default(),
            role: meta_string(meta, "role")
                .and_then(|r| r.parse::<Role>().ok())
                .unwrap_or_default(),
            rank: meta_string(meta, "rank").and_then(|r| r.parse::<Rank>().ok()),
            military_id: meta_string(meta, "military_id"),
            unit: meta_string(meta, "unit"),
            phone,
            verified,
            created_at: self.created_at,
        }
    }
}

/// Sign-up result: depending on provider settings a fresh account either
/// gets a session immediately or waits for email confirmation.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SessionIssued(AuthSession),
    ConfirmationRequired(ProviderUser),
}

/// Raw sign-up response; a session when auto-confirm is on, otherwise the
/// bare account record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpResponse {
    Session(AuthSession),
    User(ProviderUser),
}

impl From<SignUpResponse> for SignUpOutcome {
    fn from(value: SignUpResponse) -> Self {
        match value {
            SignUpResponse::Session(session) => SignUpOutcome::SessionIssued(session),
            SignUpResponse::User(user) => SignUpOutcome::ConfirmationRequired(user),
        }
    }
}

fn meta_string(meta: &serde_json::Value, key: &str) -> Option<String> {
    meta.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
