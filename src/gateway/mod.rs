//! Persistence seam between the typed stores and the backend

mod supabase;

pub use supabase::SupabaseGateway;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One record as it travels over the wire
pub type Row = Value;

/// Declarative description of a row listing
#[derive(Debug, Clone)]
pub struct ListQuery {
    select: String,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<u32>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selected columns, including any embedded joins
    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    /// Keep only rows where `column` equals `value`. Repeatable.
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    /// Cap the number of rows returned
    pub fn limit(mut self, count: u32) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn selected(&self) -> &str {
        &self.select
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.order.as_ref().map(|(c, asc)| (c.as_str(), *asc))
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }
}

/// Everything the stores need from the backing service. Implemented for
/// Supabase here and by scripted fakes in tests.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// List rows from a table
    async fn fetch_rows(&self, table: &str, query: ListQuery) -> Result<Vec<Row>>;

    /// Fetch a single row by id; `Ok(None)` when it does not exist
    async fn fetch_one(&self, table: &str, id: &str, select: &str) -> Result<Option<Row>>;

    /// Insert-or-update one row, returning the row as persisted.
    /// `on_conflict` names the unique columns when they are not the
    /// primary key.
    async fn upsert(&self, table: &str, row: Row, on_conflict: Option<&str>) -> Result<Row>;

    /// Insert a batch of rows, ignoring the response body
    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<()>;

    /// Delete every row where `column` equals `value`
    async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<()>;

    /// Store an object in a bucket
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// Public URL for an object; pure formatting, no request
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Time-limited URL for an object in a private bucket
    async fn signed_url(&self, bucket: &str, path: &str, expires_in: u64) -> Result<String>;
}
