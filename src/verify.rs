//! Table existence probe for operators. The seeding pipeline does not use it.

use std::time::Duration;
use tracing::debug;

use crate::catalog::TableDescriptor;
use crate::store::{with_timeout, Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Exists,
    Missing,
    AccessError(String),
}

impl TableStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TableStatus::Exists)
    }
}

/// Probe each table in order, one call at a time.
pub async fn probe_tables<S: Store + ?Sized>(
    store: &S,
    tables: &[TableDescriptor],
    timeout: Duration,
) -> Vec<(&'static str, TableStatus)> {
    let mut results = Vec::with_capacity(tables.len());
    for table in tables {
        let status = match with_timeout(timeout, store.probe(table.name)).await {
            Ok(()) => TableStatus::Exists,
            Err(StoreError::UndefinedRelation { .. }) => TableStatus::Missing,
            Err(e) => TableStatus::AccessError(e.to_string()),
        };
        debug!(table = table.name, ?status, "probed");
        results.push((table.name, status));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TABLES;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn reports_missing_tables() {
        let store = MemoryStore::new();
        store.mark_missing("inventory");
        let results = probe_tables(&store, TABLES, Duration::from_secs(1)).await;

        assert_eq!(results.len(), TABLES.len());
        for (table, status) in &results {
            if *table == "inventory" {
                assert_eq!(*status, TableStatus::Missing);
            } else {
                assert!(status.is_ok(), "{} should exist", table);
            }
        }
    }
}
