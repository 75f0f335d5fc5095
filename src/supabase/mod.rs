//! Access to the hosted backend: a REST table API and an object storage
//! API. Handlers talk to the traits so tests can run against
//! [`memory::MemoryStore`].

pub mod client;
pub mod error;
pub mod memory;
pub mod query;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{listing::Listing, table::ListingTable};

pub use client::SupabaseClient;
pub use error::StoreError;
pub use query::{ListingQuery, Row};

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn select(&self, table: ListingTable, query: &ListingQuery)
        -> Result<Vec<Row>, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, table: ListingTable, row: Value) -> Result<Row, StoreError>;

    /// Inserts the row, or merges it into the row with the same `id`.
    async fn upsert(&self, table: ListingTable, row: Row) -> Result<Row, StoreError>;

    async fn update(&self, table: ListingTable, id: &str, patch: Row) -> Result<(), StoreError>;

    async fn delete(&self, table: ListingTable, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores an object and returns its public URL. Without `upsert` an
    /// existing object at `path` is a conflict.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<String, StoreError>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError>;
}

/// Loads a single row by id.
pub async fn fetch_row(
    store: &dyn ListingStore,
    table: ListingTable,
    id: &str,
    columns: &str,
) -> Result<Option<Row>, StoreError> {
    let query = ListingQuery::new(columns).eq("id", id).limit(1);
    let mut rows = store.select(table, &query).await?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}

/// Runs `query` against the `listings` table and decodes the rows.
pub async fn fetch_listings(
    store: &dyn ListingStore,
    query: &ListingQuery,
) -> Result<Vec<Listing>, StoreError> {
    let rows = store.select(ListingTable::Listings, query).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value::<Listing>(Value::Object(row)).map_err(StoreError::from))
        .collect()
}

/// Listings created by `user_id`, newest first.
pub async fn fetch_owned_listings(
    store: &dyn ListingStore,
    user_id: &str,
) -> Result<Vec<Listing>, StoreError> {
    let query = ListingQuery::default()
        .eq("user_id", user_id)
        .order_desc("created_at");
    fetch_listings(store, &query).await
}
