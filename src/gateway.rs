//! Remote data gateway
//!
//! Generic table CRUD against the hosted database's REST interface. Rows travel
//! as JSON values; typed access lives in `catalog`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  #[error("Remote service unavailable: {0}")]
  Unavailable(String),

  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("API error ({status}): {message}")]
  Api { status: u16, message: String },

  #[error("Failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("Invalid URL: {0}")]
  InvalidUrl(String),

  #[error("No row returned from {0}")]
  EmptyResponse(String),
}

impl From<reqwest::Error> for GatewayError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_connect() || e.is_timeout() {
      GatewayError::Unavailable(e.to_string())
    } else {
      GatewayError::Request(e.to_string())
    }
  }
}

impl Serialize for GatewayError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Queries
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
  Eq,
  Gte,
  Lte,
}

impl FilterOp {
  pub fn as_str(&self) -> &'static str {
    match self {
      FilterOp::Eq => "eq",
      FilterOp::Gte => "gte",
      FilterOp::Lte => "lte",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub column: String,
  pub op: FilterOp,
  pub value: String,
}

/// A filtered read (or the row set targeted by an update/delete)
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
  pub table: String,
  pub columns: String,
  pub filters: Vec<Filter>,
  /// (column, ascending)
  pub order: Option<(String, bool)>,
  pub limit: Option<usize>,
}

impl TableQuery {
  pub fn new(table: &str) -> Self {
    Self {
      table: table.to_string(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order: None,
      limit: None,
    }
  }

  pub fn select(mut self, columns: &str) -> Self {
    self.columns = columns.to_string();
    self
  }

  fn filter(mut self, column: &str, op: FilterOp, value: impl ToString) -> Self {
    self.filters.push(Filter {
      column: column.to_string(),
      op,
      value: value.to_string(),
    });
    self
  }

  pub fn eq(self, column: &str, value: impl ToString) -> Self {
    self.filter(column, FilterOp::Eq, value)
  }

  pub fn gte(self, column: &str, value: impl ToString) -> Self {
    self.filter(column, FilterOp::Gte, value)
  }

  pub fn lte(self, column: &str, value: impl ToString) -> Self {
    self.filter(column, FilterOp::Lte, value)
  }

  pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
    self.order = Some((column.to_string(), ascending));
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// PostgREST query parameters: `select=..`, `col=op.value`, `order=..`, `limit=..`
  pub fn query_pairs(&self, include_select: bool) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if include_select {
      pairs.push(("select".to_string(), self.columns.clone()));
    }
    for filter in &self.filters {
      pairs.push((
        filter.column.clone(),
        format!("{}.{}", filter.op.as_str(), filter.value),
      ));
    }
    if let Some((column, ascending)) = &self.order {
      let direction = if *ascending { "asc" } else { "desc" };
      pairs.push(("order".to_string(), format!("{}.{}", column, direction)));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
  }
}

/// ---------------------------------------------------------------------------
/// Gateway
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait RemoteGateway: Send + Sync {
  async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, GatewayError>;

  /// Insert one row and return it as stored
  async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError>;

  /// Insert or merge on the `on_conflict` column
  async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value, GatewayError>;

  async fn update(&self, query: &TableQuery, changes: Value) -> Result<Vec<Value>, GatewayError>;

  /// Returns the number of rows removed
  async fn delete(&self, query: &TableQuery) -> Result<usize, GatewayError>;
}

/// Hosted database over its REST endpoint (`/rest/v1/<table>`)
#[derive(Clone)]
pub struct SupabaseGateway {
  client: Client,
  rest_base: Url,
  api_key: String,
}

impl SupabaseGateway {
  pub fn new(base_url: &str, api_key: &str) -> Result<Self, GatewayError> {
    let base = Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;
    let rest_base = base
      .join("rest/v1/")
      .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;

    Ok(Self {
      client: Client::new(),
      rest_base,
      api_key: api_key.to_string(),
    })
  }

  pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
    Self::new(config.supabase_url.as_str(), &config.supabase_anon_key)
  }

  fn table_url(&self, table: &str, pairs: &[(String, String)]) -> Result<Url, GatewayError> {
    let mut url = self
      .rest_base
      .join(table)
      .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;

    if !pairs.is_empty() {
      let mut query = url.query_pairs_mut();
      for (key, value) in pairs {
        query.append_pair(key, value);
      }
    }
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    self
      .client
      .request(method, url)
      .header("apikey", &self.api_key)
      .header("Authorization", format!("Bearer {}", self.api_key))
  }

  async fn send_for_rows(&self, request: RequestBuilder) -> Result<Vec<Value>, GatewayError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(GatewayError::Api {
        status: status.as_u16(),
        message,
      });
    }

    if status == StatusCode::NO_CONTENT {
      return Ok(Vec::new());
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
      return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&body)? {
      Value::Array(rows) => Ok(rows),
      other => Ok(vec![other]),
    }
  }

  fn first_row(table: &str, rows: Vec<Value>) -> Result<Value, GatewayError> {
    rows
      .into_iter()
      .next()
      .ok_or_else(|| GatewayError::EmptyResponse(table.to_string()))
  }
}

#[async_trait]
impl RemoteGateway for SupabaseGateway {
  async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, GatewayError> {
    let url = self.table_url(&query.table, &query.query_pairs(true))?;
    debug!(table = %query.table, "Remote select");
    self.send_for_rows(self.request(Method::GET, url)).await
  }

  async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError> {
    let url = self.table_url(table, &[])?;
    debug!(table, "Remote insert");
    let request = self
      .request(Method::POST, url)
      .header("Prefer", "return=representation")
      .json(&row);
    let rows = self.send_for_rows(request).await?;
    Self::first_row(table, rows)
  }

  async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value, GatewayError> {
    let url = self.table_url(table, &[("on_conflict".to_string(), on_conflict.to_string())])?;
    debug!(table, on_conflict, "Remote upsert");
    let request = self
      .request(Method::POST, url)
      .header("Prefer", "resolution=merge-duplicates,return=representation")
      .json(&row);
    let rows = self.send_for_rows(request).await?;
    Self::first_row(table, rows)
  }

  async fn update(&self, query: &TableQuery, changes: Value) -> Result<Vec<Value>, GatewayError> {
    let url = self.table_url(&query.table, &query.query_pairs(false))?;
    debug!(table = %query.table, "Remote update");
    let request = self
      .request(Method::PATCH, url)
      .header("Prefer", "return=representation")
      .json(&changes);
    self.send_for_rows(request).await
  }

  async fn delete(&self, query: &TableQuery) -> Result<usize, GatewayError> {
    let url = self.table_url(&query.table, &query.query_pairs(false))?;
    debug!(table = %query.table, "Remote delete");
    let request = self
      .request(Method::DELETE, url)
      .header("Prefer", "return=representation");
    Ok(self.send_for_rows(request).await?.len())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
