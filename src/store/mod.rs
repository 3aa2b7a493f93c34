//! Target store interface plus the two backends the seeder ships with.

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One record as the store sees it.
pub type Row = serde_json::Map<String, Value>;

/// Equality filter for `select`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether `row` satisfies the filter, comparing by text form.
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The target table (or its schema) has not been provisioned.
    #[error("relation `{relation}` does not exist: {message}")]
    UndefinedRelation { relation: String, message: String },

    #[error("store rejected the request (HTTP {status}{}): {message}", code_suffix(.code))]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected store response: {0}")]
    InvalidResponse(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(", code {}", c))
        .unwrap_or_default()
}

impl StoreError {
    pub fn is_undefined_relation(&self) -> bool {
        matches!(self, StoreError::UndefinedRelation { .. })
    }
}

/// Bulk-upsert / lookup surface of the target store.
///
/// Implementations treat one `upsert` call as a unit: either every row is
/// accepted or the call fails and nothing is written.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert-or-update `rows`, resolving conflicts on `conflict_key`.
    async fn upsert(&self, table: &str, rows: &[Row], conflict_key: &str)
        -> Result<(), StoreError>;

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    /// Zero-row read that only checks the table is reachable.
    async fn probe(&self, table: &str) -> Result<(), StoreError>;
}

/// Run a store call under a caller-imposed deadline.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn filter_compares_text_form() {
        let r = row(json!({"slug": "san-joaquin", "id": 7, "gone": null}));
        assert!(Filter::eq("slug", "san-joaquin").matches(&r));
        assert!(Filter::eq("id", "7").matches(&r));
        assert!(!Filter::eq("id", "8").matches(&r));
        assert!(!Filter::eq("gone", "null").matches(&r));
        assert!(!Filter::eq("missing", "x").matches(&r));
    }

    #[test]
    fn rejected_error_message_includes_code() {
        let err = StoreError::Rejected {
            status: 409,
            code: Some("23505".into()),
            message: "duplicate key".into(),
        };
        assert_eq!(
            err.to_string(),
            "store rejected the request (HTTP 409, code 23505): duplicate key"
        );
    }

    #[tokio::test]
    async fn timeout_wraps_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        };
        let err = with_timeout(Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }
}
