//! `milvault-provider`: HTTP adapter for the backend provider.
//!
//! The provider exposes three surfaces under one base URL: auth
//! (`/auth/v1`), tables (`/rest/v1`) and object storage (`/storage/v1`).
//! This crate speaks those wire contracts and nothing above them: no session
//! state, no route decisions. Every call returns `Result<_, ProviderError>`
//! with a structured code, so upper layers never classify by message text.

use std::sync::Arc;

use milvault_core::Config;

pub mod auth;
pub mod error;
pub mod http;
pub mod storage;
pub mod table;
pub mod verify;
pub mod wire;

pub use auth::{AuthApi, SignUpProfile};
pub use error::{ProviderError, ProviderErrorCode};
pub use http::{DirectExecutor, HttpExecutor};
pub use storage::{ObjectMetadata, StorageApi, StorageObject};
pub use table::{DeleteBuilder, SelectBuilder, TableApi, UpdateBuilder};
pub use verify::{MilitaryVerification, VerificationApi, VerificationDetails, VerificationRequest};
pub use wire::{AuthSession, ProviderUser, SignUpOutcome};

/// Entry point holding the shared HTTP client and provider coordinates.
#[derive(Debug, Clone)]
pub struct Provider {
    http: reqwest::Client,
    url: String,
    key: String,
}

impl Provider {
    pub fn new(config: &Config) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.provider_url.trim_end_matches('/').to_string(),
            key: config.provider_key.clone(),
        }
    }

    /// Auth surface. Always direct; it is what mints credentials.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.http.clone(), &self.url, &self.key)
    }

    /// Table surface, with request execution delegated to `executor`.
    pub fn tables(&self, executor: Arc<dyn HttpExecutor>) -> TableApi {
        TableApi::new(self.http.clone(), &self.url, &self.key, executor)
    }

    /// Storage surface, with request execution delegated to `executor`.
    pub fn storage(&self, executor: Arc<dyn HttpExecutor>) -> StorageApi {
        StorageApi::new(self.http.clone(), &self.url, &self.key, executor)
    }

    /// Military-ID verification over the table RPC surface.
    pub fn verification(&self, executor: Arc<dyn HttpExecutor>) -> VerificationApi {
        VerificationApi::new(self.tables(executor))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
