//! Lookup of a generated identity by natural key.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::catalog::Reference;
use crate::store::{with_timeout, Filter, Store, StoreError};

pub struct ReferenceResolver<'a, S: Store + ?Sized> {
    store: &'a S,
    call_timeout: Duration,
}

impl<'a, S: Store + ?Sized> ReferenceResolver<'a, S> {
    pub fn new(store: &'a S, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Identity of the row `reference` points at, or `None` if no such row
    /// exists (or it has no identity yet). Store failures are returned as-is.
    pub async fn resolve(&self, reference: &Reference) -> Result<Option<Value>, StoreError> {
        let filter = Filter::eq(reference.key_column, reference.key);
        let rows = with_timeout(
            self.call_timeout,
            self.store.select(reference.table, &filter),
        )
        .await?;

        let id = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(reference.id_column))
            .filter(|v| !v.is_null());
        debug!(
            table = reference.table,
            key = reference.key,
            found = id.is_some(),
            "resolved reference"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    const BRANCH: Reference = Reference {
        table: "branches",
        key_column: "slug",
        key: "san-joaquin",
        id_column: "id",
    };

    fn resolver(store: &MemoryStore) -> ReferenceResolver<'_, MemoryStore> {
        ReferenceResolver::new(store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn finds_identity_by_slug() {
        let store = MemoryStore::new();
        store.insert_raw(
            "branches",
            vec![
                json!({"id": 4, "slug": "la-floresta"}).as_object().unwrap().clone(),
                json!({"id": 5, "slug": "san-joaquin"}).as_object().unwrap().clone(),
            ],
        );
        assert_eq!(resolver(&store).resolve(&BRANCH).await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn absent_row_is_none() {
        let store = MemoryStore::new();
        assert_eq!(resolver(&store).resolve(&BRANCH).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_table_is_an_error() {
        let store = MemoryStore::new();
        store.mark_missing("branches");
        let err = resolver(&store).resolve(&BRANCH).await.unwrap_err();
        assert!(err.is_undefined_relation());
    }
}
