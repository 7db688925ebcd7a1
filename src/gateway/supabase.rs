//! Supabase implementation of the persistence gateway

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchBuilder};
use crate::gateway::{ListQuery, PersistenceGateway, Row};

const CLIENT_INFO: &str = "zoodb/0.2.0";

/// Talks to PostgREST and the storage API of one Supabase project.
///
/// Requests carry the user's access token as bearer when a session is
/// active, else the anon key, so server-side row policies always see the
/// real caller.
pub struct SupabaseGateway {
    /// Base project URL without a trailing slash
    url: String,

    /// The anonymous API key
    key: String,

    /// HTTP client shared with the rest of the crate
    client: Client,

    /// Access token of the signed-in user, if any
    token: Arc<RwLock<Option<String>>>,
}

impl SupabaseGateway {
    /// Create a new gateway for one project
    pub fn new(url: &str, key: &str, client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Adopt or drop the signed-in user's access token
    pub async fn set_auth(&self, token: Option<String>) {
        let mut current = self.token.write().await;
        *current = token;
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    async fn bearer(&self) -> String {
        let token = self.token.read().await;
        token.clone().unwrap_or_else(|| self.key.clone())
    }

    async fn with_auth<'a>(&self, builder: FetchBuilder<'a>) -> FetchBuilder<'a> {
        builder
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(&self.bearer().await)
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[async_trait]
impl PersistenceGateway for SupabaseGateway {
    async fn fetch_rows(&self, table: &str, query: ListQuery) -> Result<Vec<Row>> {
        let mut req = Fetch::get(&self.client, &self.rest_url(table))
            .query("select", query.selected());
        for (column, value) in query.filters() {
            req = req.query(column, &format!("eq.{}", value));
        }
        if let Some((column, ascending)) = query.ordering() {
            let direction = if ascending { "asc" } else { "desc" };
            req = req.query("order", &format!("{}.{}", column, direction));
        }
        if let Some(limit) = query.row_limit() {
            req = req.query("limit", &limit.to_string());
        }
        self.with_auth(req).await.execute::<Vec<Row>>().await
    }

    async fn fetch_one(&self, table: &str, id: &str, select: &str) -> Result<Option<Row>> {
        let query = ListQuery::new().select(select).eq("id", id).limit(1);
        let rows = self.fetch_rows(table, query).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert(&self, table: &str, row: Row, on_conflict: Option<&str>) -> Result<Row> {
        debug!("upsert into {} (on_conflict: {:?})", table, on_conflict);
        let mut req = Fetch::post(&self.client, &self.rest_url(table))
            .header("Prefer", "return=representation,resolution=merge-duplicates");
        if let Some(columns) = on_conflict {
            req = req.query("on_conflict", columns);
        }
        let rows = self
            .with_auth(req)
            .await
            .json(&row)?
            .execute::<Vec<Row>>()
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::gateway(format!("upsert into {} returned no rows", table)))
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("insert {} rows into {}", rows.len(), table);
        let req = Fetch::post(&self.client, &self.rest_url(table))
            .header("Prefer", "return=minimal");
        self.with_auth(req)
            .await
            .json(&json!(rows))?
            .execute_ok()
            .await
    }

    async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<()> {
        debug!("delete from {} where {} = {}", table, column, value);
        let req = Fetch::delete(&self.client, &self.rest_url(table))
            .query(column, &format!("eq.{}", value));
        self.with_auth(req).await.execute_ok().await
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!("upload {} bytes to {}/{}", bytes.len(), bucket, path);
        let url = format!("{}/storage/v1/object/{}/{}", self.url, bucket, path);
        let req = Fetch::post(&self.client, &url)
            .header("x-upsert", "false")
            .bytes(bytes, content_type);
        self.with_auth(req).await.execute_ok().await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.url, bucket, path)
    }

    async fn signed_url(&self, bucket: &str, path: &str, expires_in: u64) -> Result<String> {
        let url = format!("{}/storage/v1/object/sign/{}/{}", self.url, bucket, path);
        let body = json!({ "expiresIn": expires_in });
        let response = self
            .with_auth(Fetch::post(&self.client, &url))
            .await
            .json(&body)?
            .execute::<SignedUrlResponse>()
            .await?;

        // The API answers with a path relative to /storage/v1
        if response.signed_url.starts_with("http") {
            Ok(response.signed_url)
        } else {
            let relative = response.signed_url.trim_start_matches('/');
            Ok(format!("{}/storage/v1/{}", self.url, relative))
        }
    }
}
