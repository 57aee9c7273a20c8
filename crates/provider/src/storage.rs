//! Object storage endpoint client (`/storage/v1`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::http::{HttpExecutor, check, json_body, network_error};

/// Entry returned by a bucket listing.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Client for the provider's object storage surface.
#[derive(Clone)]
pub struct StorageApi {
    http: reqwest::Client,
    base: String,
    apikey: String,
    executor: Arc<dyn HttpExecutor>,
}

impl StorageApi {
    pub(crate) fn new(
        http: reqwest::Client,
        provider_url: &str,
        apikey: &str,
        executor: Arc<dyn HttpExecutor>,
    ) -> Self {
        Self {
            http,
            base: format!("{}/storage/v1", provider_url.trim_end_matches('/')),
            apikey: apikey.to_string(),
            executor,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header("apikey", &self.apikey)
    }

    /// Upload raw bytes to `bucket` at `path`. Fails if the path is taken.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProviderError> {
        let req = self
            .request(reqwest::Method::POST, &format!("/object/{bucket}/{path}"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        check(self.executor.execute(req).await?).await.map(|_| ())
    }

    /// Upload that replaces whatever is already stored at `path`.
    pub async fn upload_overwriting(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProviderError> {
        let req = self
            .request(reqwest::Method::POST, &format!("/object/{bucket}/{path}"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);

        check(self.executor.execute(req).await?).await.map(|_| ())
    }

    /// Download an object's bytes.
    pub async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
        let req = self.request(reqwest::Method::GET, &format!("/object/{bucket}/{path}"));

        let resp = check(self.executor.execute(req).await?).await?;
        let bytes = resp.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }

    /// Delete objects by path.
    pub async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), ProviderError> {
        let req = self
            .request(reqwest::Method::DELETE, &format!("/object/{bucket}"))
            .json(&json!({ "prefixes": paths }));

        check(self.executor.execute(req).await?).await.map(|_| ())
    }

    /// Mint a time-limited download URL for a private object.
    pub async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u32,
    ) -> Result<String, ProviderError> {
        let req = self
            .request(
                reqwest::Method::POST,
                &format!("/object/sign/{bucket}/{path}"),
            )
            .json(&json!({ "expiresIn": expires_in_secs }));

        let resp = check(self.executor.execute(req).await?).await?;
        let signed: SignedUrlResponse = json_body(resp).await?;
        Ok(format!("{}{}", self.base, signed.signed_url))
    }

    /// Stable URL for an object in a public bucket. No network call.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{bucket}/{path}", self.base)
    }

    /// List objects under `prefix`.
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObject>, ProviderError> {
        let req = self
            .request(reqwest::Method::POST, &format!("/object/list/{bucket}"))
            .json(&json!({ "prefix": prefix, "limit": 100, "offset": 0 }));

        let resp = check(self.executor.execute(req).await?).await?;
        json_body(resp).await
    }
}

impl std::fmt::Debug for StorageApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageApi")
            .field("base", &self.base)
            .finish()
    }
}
