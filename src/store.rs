//! Change store abstraction
//!
//! The reporter only ever reads three things from the backing database: the
//! table list, whether a table has a given column, and the rows of a table
//! edited after a cutoff. [`ChangeStore`] is that seam; [`crate::db::PgStore`]
//! is the PostgreSQL implementation.

use crate::error::AppError;
use crate::report::Cutoff;
use serde_json::{Map, Value};
use std::future::Future;

/// One row returned by a changed-since query
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedRow {
    /// All columns of the row, keyed by column name
    pub fields: Map<String, Value>,
    /// The modification timestamp, rendered the way the store prints it
    pub last_edited: String,
}

impl ChangedRow {
    /// Column value as display text; `None` for missing or NULL columns
    pub fn text(&self, column: &str) -> Option<String> {
        match self.fields.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Read-only access to the raw store
pub trait ChangeStore {
    /// Every physical table, in store order
    fn list_tables(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Whether `table` declares a column called `column`
    fn column_exists(
        &self,
        table: &str,
        column: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Rows of `table` whose `column` is strictly greater than the cutoff
    fn rows_changed_since(
        &self,
        table: &str,
        column: &str,
        cutoff: &Cutoff,
    ) -> impl Future<Output = Result<Vec<ChangedRow>, AppError>> + Send;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_row_text() {
        let row = ChangedRow {
            fields: json!({"ID": 7, "Title": "Home", "Note": null})
                .as_object()
                .cloned()
                .unwrap(),
            last_edited: "2024-02-01 00:00:00".to_string(),
        };

        assert_eq!(row.text("ID").as_deref(), Some("7"));
        assert_eq!(row.text("Title").as_deref(), Some("Home"));
        assert_eq!(row.text("Note"), None);
        assert_eq!(row.text("Missing"), None);
    }

    #[test]
    fn test_memory_store_probes() {
        let store = memory::MemoryStore::new()
            .table("legacy_log", &["ID", "LastEdited"], vec![])
            .table("tag_map", &["TagID"], vec![]);

        let tables = tokio_test::block_on(store.list_tables()).unwrap();
        assert_eq!(tables, vec!["legacy_log", "tag_map"]);
        assert!(tokio_test::block_on(store.column_exists("legacy_log", "LastEdited")).unwrap());
        assert!(!tokio_test::block_on(store.column_exists("tag_map", "LastEdited")).unwrap());
        assert!(!tokio_test::block_on(store.column_exists("missing", "LastEdited")).unwrap());
    }
}
