//! Credential-handling HTTP layer.
//!
//! [`AuthHttp`] sits between callers and `reqwest`: it attaches the cached
//! bearer token, turns a 401 into a coalesced refresh plus a single retry,
//! and routes the user to the login or unauthorized page when the session
//! cannot be repaired. Table and storage clients reach it through the
//! provider's executor seam.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use thiserror::Error;

use milvault_provider::{HttpExecutor, ProviderError, ProviderErrorCode};

use crate::error::AuthError;
use crate::guard::targets;
use crate::manager::SessionManager;
use crate::navigate::Navigator;

/// How a request failed inside the credential layer. Non-auth statuses pass
/// through as responses; callers classify those themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request could not be built: {0}")]
    Request(String),

    /// The session could not be refreshed, or the refreshed token was
    /// rejected again.
    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("forbidden")]
    Forbidden,
}

impl From<HttpError> for ProviderError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(msg) | HttpError::Request(msg) => ProviderError::Network(msg),
            HttpError::SessionExpired => ProviderError::Api {
                status: 401,
                code: ProviderErrorCode::SessionExpired,
                message: "session expired".into(),
            },
            HttpError::Forbidden => ProviderError::Api {
                status: 403,
                code: ProviderErrorCode::Unknown,
                message: "forbidden".into(),
            },
        }
    }
}

/// `reqwest` wrapper that carries the session's credentials.
pub struct AuthHttp {
    http: reqwest::Client,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    /// URL or path prefixes sent without credential handling.
    skip_prefixes: Vec<String>,
}

impl AuthHttp {
    pub fn new(
        http: reqwest::Client,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        // Auth endpoints mint and revoke tokens; running them through the
        // refresh path would recurse. Asset and translation fetches carry no
        // credentials either.
        let provider_auth = format!(
            "{}/auth/v1",
            session.config().provider_url.trim_end_matches('/')
        );
        Self {
            http,
            session,
            navigator,
            skip_prefixes: vec![provider_auth, "/assets/".into(), "/locales/".into()],
        }
    }

    /// Add a prefix to send without credential handling. Absolute prefixes
    /// match the whole URL, `/`-prefixes match the path.
    pub fn skip(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Execute a request with bearer attach, refresh-on-401 and one retry.
    pub async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HttpError> {
        let mut request = req
            .build()
            .map_err(|err| HttpError::Request(err.to_string()))?;

        if self.should_skip(request.url()) {
            return self
                .http
                .execute(request)
                .await
                .map_err(|err| HttpError::Network(err.to_string()));
        }

        let sent_token = self.session.access_token();
        if let Some(token) = &sent_token {
            attach_bearer(&mut request, token);
        }

        // Streaming bodies return None here and lose retry eligibility.
        let retry = request.try_clone();

        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|err| HttpError::Network(err.to_string()))?;

        match resp.status().as_u16() {
            401 => self.recover_unauthorized(retry, sent_token).await,
            403 => {
                tracing::warn!(url = %resp.url(), "request forbidden");
                self.navigator.navigate(targets::UNAUTHORIZED);
                Err(HttpError::Forbidden)
            }
            status => {
                if !resp.status().is_success() {
                    tracing::warn!(status, url = %resp.url(), "request failed");
                }
                Ok(resp)
            }
        }
    }

    /// A 401 came back on `sent_token`; refresh (coalesced with any other
    /// 401s in flight) and retry the request once with the new token.
    async fn recover_unauthorized(
        &self,
        retry: Option<reqwest::Request>,
        sent_token: Option<String>,
    ) -> Result<reqwest::Response, HttpError> {
        let pair = match self.session.refresh_coalesced(sent_token.as_deref()).await {
            Ok(pair) => pair,
            Err(AuthError::NetworkUnreachable) => {
                // The session may still be fine; do not bounce the user.
                return Err(HttpError::Network("refresh unreachable".into()));
            }
            Err(err) => {
                tracing::info!("session not recoverable: {err}");
                self.redirect_to_login();
                return Err(HttpError::SessionExpired);
            }
        };

        let Some(mut request) = retry else {
            return Err(HttpError::SessionExpired);
        };
        attach_bearer_replacing(&mut request, &pair.access_token);

        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|err| HttpError::Network(err.to_string()))?;

        match resp.status().as_u16() {
            401 => {
                // A token the provider just issued is already rejected.
                tracing::warn!(url = %resp.url(), "refreshed token rejected");
                self.session.clear_session();
                self.redirect_to_login();
                Err(HttpError::SessionExpired)
            }
            403 => {
                self.navigator.navigate(targets::UNAUTHORIZED);
                Err(HttpError::Forbidden)
            }
            status => {
                if !resp.status().is_success() {
                    tracing::warn!(status, url = %resp.url(), "retried request failed");
                }
                Ok(resp)
            }
        }
    }

    fn should_skip(&self, url: &reqwest::Url) -> bool {
        self.skip_prefixes.iter().any(|prefix| {
            if prefix.starts_with('/') {
                url.path().starts_with(prefix.as_str())
            } else {
                url.as_str().starts_with(prefix.as_str())
            }
        })
    }

    fn redirect_to_login(&self) {
        let target = match self.navigator.current_path() {
            Some(current) => format!("{}?returnUrl={current}", targets::LOGIN),
            None => targets::LOGIN.to_string(),
        };
        self.navigator.navigate(&target);
    }
}

impl std::fmt::Debug for AuthHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHttp")
            .field("skip_prefixes", &self.skip_prefixes)
            .finish_non_exhaustive()
    }
}

/// Attach the token unless the caller set its own Authorization header.
fn attach_bearer(request: &mut reqwest::Request, token: &str) {
    if request.headers().contains_key(AUTHORIZATION) {
        return;
    }
    attach_bearer_replacing(request, token);
}

fn attach_bearer_replacing(request: &mut reqwest::Request, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(value) => {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(err) => tracing::warn!("token not header-safe, sending without bearer: {err}"),
    }
}

// Table and storage clients run through the credential layer via this seam.
#[async_trait::async_trait]
impl HttpExecutor for AuthHttp {
    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        AuthHttp::execute(self, req).await.map_err(Into::into)
    }
}
