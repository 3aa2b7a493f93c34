// src/store/memory.rs

use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use super::{Filter, Row, Store, StoreError};

/// In-process store with upsert semantics close to the REST backend:
/// generated `id`s for rows that carry none, atomic batches, and switches to
/// simulate missing tables or rejected writes.
///
/// Every table exists unless marked missing.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<Row>>,
    missing: HashSet<String>,
    rejections: HashMap<String, String>,
    next_id: i64,
    /// Table name of every accepted upsert, in call order.
    writes: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call touching `table` fail as an undefined relation.
    pub fn mark_missing(&self, table: &str) {
        self.state.lock().unwrap().missing.insert(table.to_string());
    }

    /// Make upserts into `table` fail with a constraint violation.
    pub fn reject_writes(&self, table: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(table.to_string(), message.to_string());
    }

    /// Seed rows directly, bypassing upsert rules.
    pub fn insert_raw(&self, table: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    fn ensure_exists(state: &State, table: &str) -> Result<(), StoreError> {
        if state.missing.contains(table) {
            return Err(StoreError::UndefinedRelation {
                relation: format!("public.{}", table),
                message: format!("relation \"public.{}\" does not exist", table),
            });
        }
        Ok(())
    }
}

fn key_of<'a>(row: &'a Row, conflict_key: &str) -> Option<&'a Value> {
    row.get(conflict_key).filter(|v| !v.is_null())
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_key: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_exists(&state, table)?;
        if let Some(message) = state.rejections.get(table) {
            return Err(StoreError::Rejected {
                status: 409,
                code: Some("23505".into()),
                message: message.clone(),
            });
        }

        // 1) validate the whole batch before touching anything
        let mut batch_keys = HashSet::new();
        for row in rows {
            let key = key_of(row, conflict_key).ok_or_else(|| StoreError::Rejected {
                status: 400,
                code: Some("23502".into()),
                message: format!(
                    "null value in column \"{}\" of relation \"{}\"",
                    conflict_key, table
                ),
            })?;
            if !batch_keys.insert(key.to_string()) {
                return Err(StoreError::Rejected {
                    status: 500,
                    code: Some("21000".into()),
                    message: "ON CONFLICT DO UPDATE command cannot affect row a second time"
                        .into(),
                });
            }
        }

        // 2) apply: merge into the matching row, or insert with a generated id
        let State {
            tables,
            next_id,
            writes,
            ..
        } = &mut *state;
        let existing = tables.entry(table.to_string()).or_default();
        for row in rows {
            let key = key_of(row, conflict_key);
            match existing
                .iter_mut()
                .find(|r| key_of(r, conflict_key) == key)
            {
                Some(current) => {
                    for (k, v) in row {
                        current.insert(k.clone(), v.clone());
                    }
                }
                None => {
                    let mut fresh = row.clone();
                    if !fresh.contains_key("id") {
                        *next_id += 1;
                        fresh.insert("id".into(), Value::from(*next_id));
                    }
                    existing.push(fresh);
                }
            }
        }
        writes.push(table.to_string());
        Ok(())
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let state = self.state.lock().unwrap();
        Self::ensure_exists(&state, table)?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn probe(&self, table: &str) -> Result<(), StoreError> {
        let state = self.state.lock().unwrap();
        Self::ensure_exists(&state, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: Value) -> Vec<Row> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = rows(json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]));
        store.upsert("categories", &batch, "id").await.unwrap();
        store.upsert("categories", &batch, "id").await.unwrap();
        assert_eq!(store.rows("categories"), batch);
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = MemoryStore::new();
        store
            .upsert("categories", &rows(json!([{"id": 1, "name": "a"}])), "id")
            .await
            .unwrap();
        store
            .upsert("categories", &rows(json!([{"id": 1, "name": "z"}])), "id")
            .await
            .unwrap();
        assert_eq!(store.rows("categories"), rows(json!([{"id": 1, "name": "z"}])));
    }

    #[tokio::test]
    async fn natural_keys_get_generated_ids_once() {
        let store = MemoryStore::new();
        let batch = rows(json!([{"slug": "a"}, {"slug": "b"}]));
        store.upsert("branches", &batch, "slug").await.unwrap();
        store.upsert("branches", &batch, "slug").await.unwrap();
        let stored = store.rows("branches");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0]["id"], json!(1));
        assert_eq!(stored[1]["id"], json!(2));
    }

    #[tokio::test]
    async fn duplicate_keys_in_one_batch_fail_atomically() {
        let store = MemoryStore::new();
        let batch = rows(json!([{"id": 1}, {"id": 2}, {"id": 1}]));
        let err = store.upsert("orders", &batch, "id").await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 500, .. }));
        assert!(store.rows("orders").is_empty());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn missing_tables_are_undefined_relations() {
        let store = MemoryStore::new();
        store.mark_missing("orders");
        let err = store.upsert("orders", &[], "id").await.unwrap_err();
        assert!(err.is_undefined_relation());
        assert!(store.probe("orders").await.unwrap_err().is_undefined_relation());
        assert!(store.probe("clients").await.is_ok());
    }

    #[tokio::test]
    async fn select_filters_rows() {
        let store = MemoryStore::new();
        store.insert_raw("branches", rows(json!([{"id": 9, "slug": "x"}, {"id": 10, "slug": "y"}])));
        let found = store
            .select("branches", &Filter::eq("slug", "y"))
            .await
            .unwrap();
        assert_eq!(found, rows(json!([{"id": 10, "slug": "y"}])));
    }
}
