//! Request execution seam.
//!
//! Table and storage calls go through an [`HttpExecutor`] so the session
//! layer can wrap them with credential handling (bearer attach, refresh on
//! 401) without this crate depending on it. Auth endpoints always use the
//! plain [`DirectExecutor`]; refreshing a refresh call would recurse.

use serde::de::DeserializeOwned;

use crate::error::{ProviderError, api_error};

/// Executes a prepared request and returns the raw response.
///
/// Implementations decide what travels with the request (credentials) and
/// what happens on auth failures. Transport failures map to
/// [`ProviderError::Network`].
#[async_trait::async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError>;
}

/// Sends the request as built, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

#[async_trait::async_trait]
impl HttpExecutor for DirectExecutor {
    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        req.send().await.map_err(network_error)
    }
}

pub(crate) fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network(err.to_string())
}

/// Pass 2xx responses through, classify everything else.
pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Decode a 2xx response body, reporting undecodable payloads distinctly.
pub(crate) async fn json_body<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ProviderError> {
    let body = resp.text().await.map_err(network_error)?;
    serde_json::from_str(&body).map_err(|err| ProviderError::Payload(err.to_string()))
}
