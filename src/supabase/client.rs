use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use super::{ListingQuery, ListingStore, ObjectStorage, Row, StoreError};
use crate::models::table::ListingTable;

/// HTTP client for the hosted REST and storage APIs, authenticated with a
/// single key (anon or service role).
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RemoveObjects<'a> {
    prefixes: &'a [String],
}

impl SupabaseClient {
    pub fn new(base_url: &str, key: &str) -> Result<SupabaseClient> {
        let mut headers: HeaderMap = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).context("backend key is not a valid header value")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .context("backend key is not a valid header value")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build backend http client")?;

        Ok(SupabaseClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: ListingTable) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        crate::storage::public_url(&self.base_url, bucket, path)
    }
}

/// Turns a non-success response into [`StoreError::Backend`] carrying the
/// backend's message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);

    Err(StoreError::backend(status.as_u16(), message))
}

#[async_trait]
impl ListingStore for SupabaseClient {
    async fn select(
        &self,
        table: ListingTable,
        query: &ListingQuery,
    ) -> Result<Vec<Row>, StoreError> {
        let params = query.to_pairs();
        debug!("select from {} with {:?}", table, params);

        let response = self
            .http
            .get(self.table_url(table))
            .query(&params)
            .send()
            .await?;

        Ok(check(response).await?.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, table: ListingTable, row: Value) -> Result<Row, StoreError> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let mut rows = check(response).await?.json::<Vec<Row>>().await?;
        if rows.is_empty() {
            return Err(StoreError::backend(500, "insert returned no row"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn upsert(&self, table: ListingTable, row: Row) -> Result<Row, StoreError> {
        let response = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row)
            .send()
            .await?;

        let mut rows = check(response).await?.json::<Vec<Row>>().await?;
        if rows.is_empty() {
            return Err(StoreError::backend(500, "upsert returned no row"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: ListingTable, id: &str, patch: Row) -> Result<(), StoreError> {
        let response = self
            .http
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .json(&patch)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn delete(&self, table: ListingTable, id: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<String, StoreError> {
        let response = self
            .http
            .post(self.object_url(bucket, path))
            .header(CONTENT_TYPE, content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        check(response).await?;
        Ok(self.public_url(bucket, path))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(format!("{}/storage/v1/object/{}", self.base_url, bucket))
            .json(&RemoveObjects { prefixes: paths })
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}
