use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{ListingQuery, ListingStore, ObjectStorage, Row, StoreError};
use crate::models::listing::value_as_text;
use crate::models::table::ListingTable;

/// In-process backend used by tests and local runs without credentials.
#[derive(Debug)]
pub struct MemoryStore {
    base_url: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<ListingTable, Vec<Row>>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    removals: Vec<(String, Vec<String>)>,
    selects: usize,
    failing_selects: Option<String>,
    failing_writes: Option<String>,
    failing_storage: Option<String>,
    missing_buckets: HashSet<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new("http://localhost:54321")
    }
}

impl MemoryStore {
    pub fn new(base_url: &str) -> MemoryStore {
        MemoryStore {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn seed(&self, table: ListingTable, rows: impl IntoIterator<Item = Row>) {
        self.lock().tables.entry(table).or_default().extend(rows);
    }

    pub fn rows(&self, table: ListingTable) -> Vec<Row> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn put_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) {
        self.lock()
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
    }

    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Every `remove` call received, in order.
    pub fn removals(&self) -> Vec<(String, Vec<String>)> {
        self.lock().removals.clone()
    }

    pub fn select_count(&self) -> usize {
        self.lock().selects
    }

    pub fn set_failing_selects(&self, message: Option<&str>) {
        self.lock().failing_selects = message.map(str::to_string);
    }

    pub fn set_failing_writes(&self, message: Option<&str>) {
        self.lock().failing_writes = message.map(str::to_string);
    }

    pub fn set_failing_storage(&self, message: Option<&str>) {
        self.lock().failing_storage = message.map(str::to_string);
    }

    /// Uploads to `bucket` fail as if it did not exist.
    pub fn drop_bucket(&self, bucket: &str) {
        self.lock().missing_buckets.insert(bucket.to_string());
    }
}

fn failure(message: &Option<String>) -> Result<(), StoreError> {
    match message {
        Some(message) => Err(StoreError::backend(500, message.clone())),
        None => Ok(()),
    }
}

fn id_matches(row: &Row, id: &str) -> bool {
    row.get("id")
        .and_then(value_as_text)
        .map_or(false, |row_id| row_id == id)
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn select(
        &self,
        table: ListingTable,
        query: &ListingQuery,
    ) -> Result<Vec<Row>, StoreError> {
        let mut state = self.lock();
        state.selects += 1;
        failure(&state.failing_selects)?;

        Ok(match state.tables.get(&table) {
            Some(rows) => query.apply(rows),
            None => Vec::new(),
        })
    }

    async fn insert(&self, table: ListingTable, row: Value) -> Result<Row, StoreError> {
        let mut state = self.lock();
        failure(&state.failing_writes)?;

        let Value::Object(mut row) = row else {
            return Err(StoreError::backend(400, "insert payload must be an object"));
        };
        if row.get("id").map_or(true, Value::is_null) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if row.get("created_at").map_or(true, Value::is_null) {
            row.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        state.tables.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn upsert(&self, table: ListingTable, row: Row) -> Result<Row, StoreError> {
        let mut state = self.lock();
        failure(&state.failing_writes)?;

        let id = row
            .get("id")
            .and_then(value_as_text)
            .ok_or_else(|| StoreError::backend(400, "upsert payload needs an id"))?;
        let rows = state.tables.entry(table).or_default();
        match rows.iter_mut().find(|existing| id_matches(existing, &id)) {
            Some(existing) => {
                for (key, value) in row {
                    existing.insert(key, value);
                }
                Ok(existing.clone())
            }
            None => {
                rows.push(row.clone());
                Ok(row)
            }
        }
    }

    async fn update(&self, table: ListingTable, id: &str, patch: Row) -> Result<(), StoreError> {
        let mut state = self.lock();
        failure(&state.failing_writes)?;

        if let Some(rows) = state.tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| id_matches(row, id)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: ListingTable, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        failure(&state.failing_writes)?;

        if let Some(rows) = state.tables.get_mut(&table) {
            rows.retain(|row| !id_matches(row, id));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<String, StoreError> {
        let mut state = self.lock();
        failure(&state.failing_storage)?;
        if state.missing_buckets.contains(bucket) {
            return Err(StoreError::backend(404, "Bucket not found"));
        }

        let key = (bucket.to_string(), path.to_string());
        if !upsert && state.objects.contains_key(&key) {
            return Err(StoreError::backend(409, "The resource already exists"));
        }
        state.objects.insert(key, bytes);
        Ok(crate::storage::public_url(&self.base_url, bucket, path))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError> {
        let mut state = self.lock();
        failure(&state.failing_storage)?;

        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        state.removals.push((bucket.to_string(), paths.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let store = MemoryStore::default();
        let row = store
            .insert(ListingTable::Listings, json!({ "title": "Etta" }))
            .await
            .unwrap();

        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(store.rows(ListingTable::Listings).len(), 1);
    }

    #[tokio::test]
    async fn update_merges_into_matching_row_only() {
        let store = MemoryStore::default();
        let Value::Object(a) = json!({ "id": 1, "title": "a" }) else { unreachable!() };
        let Value::Object(b) = json!({ "id": 2, "title": "b" }) else { unreachable!() };
        store.seed(ListingTable::Annonser, [a, b]);

        let Value::Object(patch) = json!({ "title": "changed" }) else { unreachable!() };
        store.update(ListingTable::Annonser, "2", patch).await.unwrap();

        let rows = store.rows(ListingTable::Annonser);
        assert_eq!(rows[0]["title"], "a");
        assert_eq!(rows[1]["title"], "changed");
    }

    #[tokio::test]
    async fn upsert_inserts_then_merges() {
        let store = MemoryStore::default();
        let Value::Object(first) = json!({ "id": "u1", "full_name": "Anna", "phone": null })
        else { unreachable!() };
        store.upsert(ListingTable::Profiles, first).await.unwrap();

        let Value::Object(second) = json!({ "id": "u1", "phone": "+46701234567" })
        else { unreachable!() };
        let merged = store.upsert(ListingTable::Profiles, second).await.unwrap();

        assert_eq!(merged["full_name"], "Anna");
        assert_eq!(merged["phone"], "+46701234567");
        assert_eq!(store.rows(ListingTable::Profiles).len(), 1);
    }

    #[tokio::test]
    async fn upload_conflicts_unless_upserting() {
        let store = MemoryStore::default();
        store
            .upload("avatars", "u1/a.jpg", "image/jpeg", vec![1], false)
            .await
            .unwrap();

        let err = store
            .upload("avatars", "u1/a.jpg", "image/jpeg", vec![2], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");

        store
            .upload("avatars", "u1/a.jpg", "image/jpeg", vec![3], true)
            .await
            .unwrap();
        assert!(store.has_object("avatars", "u1/a.jpg"));
        assert_eq!(store.object_count(), 1);
    }
}
