//! Table endpoint client (`/rest/v1`).
//!
//! Query shapes follow the provider's REST dialect: filters are query
//! parameters like `status=eq.active`, ordering is `order=col.desc`, and
//! mutations ask for `return=representation` so callers get the final rows
//! back without a second round trip.

use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ProviderError;
use crate::http::{HttpExecutor, check, json_body};

/// Client for the provider's table surface.
///
/// Requests run through the injected [`HttpExecutor`], which is where the
/// session layer attaches credentials and handles auth failures.
#[derive(Clone)]
pub struct TableApi {
    http: reqwest::Client,
    base: String,
    apikey: String,
    executor: Arc<dyn HttpExecutor>,
}

impl TableApi {
    pub(crate) fn new(
        http: reqwest::Client,
        provider_url: &str,
        apikey: &str,
        executor: Arc<dyn HttpExecutor>,
    ) -> Self {
        Self {
            http,
            base: format!("{}/rest/v1", provider_url.trim_end_matches('/')),
            apikey: apikey.to_string(),
            executor,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header("apikey", &self.apikey)
    }

    /// Start a filtered read of `table`.
    pub fn select(&self, table: &str) -> SelectBuilder {
        SelectBuilder {
            api: self.clone(),
            table: table.to_string(),
            columns: None,
            params: Vec::new(),
        }
    }

    /// Insert rows and return the stored representation.
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        rows: &T,
    ) -> Result<Vec<R>, ProviderError> {
        let req = self
            .request(reqwest::Method::POST, &format!("/{table}"))
            .header("Prefer", "return=representation")
            .json(rows);

        let resp = check(self.executor.execute(req).await?).await?;
        json_body(resp).await
    }

    /// Insert a single row, failing if the provider returns nothing back.
    pub async fn insert_one<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, ProviderError> {
        let mut rows: Vec<R> = self.insert(table, row).await?;
        if rows.is_empty() {
            return Err(ProviderError::Payload(format!(
                "insert into {table} returned no representation"
            )));
        }
        Ok(rows.remove(0))
    }

    /// Start a filtered update of `table`.
    pub fn update(&self, table: &str) -> UpdateBuilder {
        UpdateBuilder {
            api: self.clone(),
            table: table.to_string(),
            filters: Vec::new(),
        }
    }

    /// Start a filtered delete from `table`.
    pub fn delete(&self, table: &str) -> DeleteBuilder {
        DeleteBuilder {
            api: self.clone(),
            table: table.to_string(),
            filters: Vec::new(),
        }
    }

    /// Call a database function under `/rpc`.
    pub async fn rpc<A: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        args: &A,
    ) -> Result<R, ProviderError> {
        let req = self
            .request(reqwest::Method::POST, &format!("/rpc/{function}"))
            .json(args);

        let resp = check(self.executor.execute(req).await?).await?;
        json_body(resp).await
    }
}

impl std::fmt::Debug for TableApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableApi").field("base", &self.base).finish()
    }
}

/// Builder for a filtered read.
///
/// Timestamp bounds must be passed pre-formatted (RFC 3339); `Display` on
/// `chrono` types is not the wire format.
#[derive(Debug)]
pub struct SelectBuilder {
    api: TableApi,
    table: String,
    columns: Option<String>,
    params: Vec<(String, String)>,
}

impl SelectBuilder {
    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.params
            .push((column.to_string(), format!("ilike.{pattern}")));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("gte.{value}")));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("lte.{value}")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn offset(mut self, n: u32) -> Self {
        self.params.push(("offset".to_string(), n.to_string()));
        self
    }

    /// Execute and decode all matching rows.
    pub async fn fetch<R: DeserializeOwned>(self) -> Result<Vec<R>, ProviderError> {
        let query = self.query_params();
        let req = self
            .api
            .request(reqwest::Method::GET, &format!("/{}", self.table))
            .query(&query);

        let resp = check(self.api.executor.execute(req).await?).await?;
        json_body(resp).await
    }

    /// Execute and decode the first matching row, if any.
    pub async fn fetch_one<R: DeserializeOwned>(self) -> Result<Option<R>, ProviderError> {
        let mut rows: Vec<R> = self.limit(1).fetch().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    fn query_params(&self) -> Vec<(String, String)> {
        let mut query = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];
        query.extend(self.params.iter().cloned());
        query
    }
}

/// Builder for a filtered update.
#[derive(Debug)]
pub struct UpdateBuilder {
    api: TableApi,
    table: String,
    filters: Vec<(String, String)>,
}

impl UpdateBuilder {
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{value}")));
        self
    }

    /// Apply `patch` to all matching rows, returning their new state.
    pub async fn apply<T: Serialize, R: DeserializeOwned>(
        self,
        patch: &T,
    ) -> Result<Vec<R>, ProviderError> {
        let req = self
            .api
            .request(reqwest::Method::PATCH, &format!("/{}", self.table))
            .header("Prefer", "return=representation")
            .query(&self.filters)
            .json(patch);

        let resp = check(self.api.executor.execute(req).await?).await?;
        json_body(resp).await
    }
}

/// Builder for a filtered delete.
#[derive(Debug)]
pub struct DeleteBuilder {
    api: TableApi,
    table: String,
    filters: Vec<(String, String)>,
}

impl DeleteBuilder {
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub async fn execute(self) -> Result<(), ProviderError> {
        let req = self
            .api
            .request(reqwest::Method::DELETE, &format!("/{}", self.table))
            .query(&self.filters);

        check(self.api.executor.execute(req).await?).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::DirectExecutor;

    fn api() -> TableApi {
        TableApi::new(
            reqwest::Client::new(),
            "http://localhost:54321",
            "test-key",
            Arc::new(DirectExecutor),
        )
    }

    #[test]
    fn select_defaults_to_all_columns() {
        let builder = api().select("documents");
        assert_eq!(
            builder.query_params(),
            vec![("select".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn filters_serialize_in_the_rest_dialect() {
        let builder = api()
            .select("documents")
            .columns("id,title")
            .eq("owner_id", "u-1")
            .ilike("title", "*brief*")
            .gte("created_at", "2025-01-01T00:00:00+00:00")
            .order("created_at", false)
            .limit(20)
            .offset(40);

        let params = builder.query_params();
        assert!(params.contains(&("select".to_string(), "id,title".to_string())));
        assert!(params.contains(&("owner_id".to_string(), "eq.u-1".to_string())));
        assert!(params.contains(&("title".to_string(), "ilike.*brief*".to_string())));
        assert!(params.contains(&(
            "created_at".to_string(),
            "gte.2025-01-01T00:00:00+00:00".to_string()
        )));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "20".to_string())));
        assert!(params.contains(&("offset".to_string(), "40".to_string())));
    }
}
