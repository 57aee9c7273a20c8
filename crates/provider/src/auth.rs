//! Auth endpoint client (`/auth/v1`).

use serde::Serialize;
use serde_json::json;

use milvault_core::ProfileUpdate;

use crate::error::{ProviderError, ProviderErrorCode};
use crate::http::{check, json_body, network_error};
use crate::wire::{AuthSession, ProviderUser, SignUpOutcome, SignUpResponse};

/// Profile metadata attached to a sign-up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpProfile {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub military_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<milvault_core::Rank>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Client for the provider's auth surface.
///
/// These endpoints never go through the credential-handling executor: they
/// are the thing that produces credentials in the first place.
#[derive(Debug, Clone)]
pub struct AuthApi {
    http: reqwest::Client,
    base: String,
    apikey: String,
}

impl AuthApi {
    pub(crate) fn new(http: reqwest::Client, provider_url: &str, apikey: &str) -> Self {
        Self {
            http,
            base: format!("{}/auth/v1", provider_url.trim_end_matches('/')),
            apikey: apikey.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header("apikey", &self.apikey)
    }

    /// Register a new account with profile metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/signup")
            .json(&json!({
                "email": email,
                "password": password,
                "data": profile,
            }))
            .send()
            .await
            .map_err(network_error)?;

        let resp = check(resp).await?;
        let raw: SignUpResponse = json_body(resp).await?;
        Ok(raw.into())
    }

    /// Exchange email/password for a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(network_error)?;

        let resp = check(resp).await.map_err(classify_sign_in)?;
        json_body(resp).await
    }

    /// Exchange a refresh token for a fresh session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(network_error)?;

        let resp = check(resp).await.map_err(classify_refresh)?;
        json_body(resp).await
    }

    /// Invalidate the session server-side.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network_error)?;

        check(resp).await.map(|_| ())
    }

    /// Send a password recovery email.
    pub async fn reset_password_request(&self, email: &str) -> Result<(), ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/recover")
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(network_error)?;

        check(resp).await.map(|_| ())
    }

    /// Set a new password using the token from a recovery link.
    pub async fn reset_password_confirm(
        &self,
        recovery_token: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        let resp = self
            .request(reqwest::Method::PUT, "/user")
            .bearer_auth(recovery_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(network_error)?;

        check(resp).await.map(|_| ())
    }

    /// Re-send the signup confirmation email.
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), ProviderError> {
        let resp = self
            .request(reqwest::Method::POST, "/resend")
            .json(&json!({ "type": "signup", "email": email }))
            .send()
            .await
            .map_err(network_error)?;

        check(resp).await.map(|_| ())
    }

    /// Fetch the account for an access token.
    pub async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, ProviderError> {
        let resp = self
            .request(reqwest::Method::GET, "/user")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network_error)?;

        let resp = check(resp).await?;
        json_body(resp).await
    }

    /// Update profile metadata on the account.
    pub async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<ProviderUser, ProviderError> {
        let mut data = serde_json::Map::new();
        if let Some(v) = &update.first_name {
            data.insert("first_name".into(), json!(v));
        }
        if let Some(v) = &update.last_name {
            data.insert("last_name".into(), json!(v));
        }
        if let Some(v) = &update.phone {
            data.insert("phone".into(), json!(v));
        }
        if let Some(v) = &update.unit {
            data.insert("unit".into(), json!(v));
        }

        let resp = self
            .request(reqwest::Method::PUT, "/user")
            .bearer_auth(access_token)
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(network_error)?;

        let resp = check(resp).await?;
        json_body(resp).await
    }
}

/// A credential rejection without a structured code still means bad
/// credentials on this endpoint.
fn classify_sign_in(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::Api {
            status: status @ (400 | 401),
            code: ProviderErrorCode::Unknown,
            message,
        } => ProviderError::Api {
            status,
            code: ProviderErrorCode::InvalidCredentials,
            message,
        },
        other => other,
    }
}

/// A rejected refresh grant means the session is gone, coded or not.
fn classify_refresh(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::Api {
            status: status @ (400 | 401 | 404),
            code: ProviderErrorCode::Unknown,
            message,
        } => ProviderError::Api {
            status,
            code: ProviderErrorCode::SessionExpired,
            message,
        },
        other => other,
    }
}
