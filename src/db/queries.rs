//! SQL query constants and builders
//!
//! Contains all SQL queries used by the application.

/// List all base tables in a schema
pub const LIST_TABLES: &str = r#"
    SELECT t.table_name::text AS name
    FROM information_schema.tables t
    WHERE t.table_schema::text = $1::text
        AND t.table_type = 'BASE TABLE'
    ORDER BY t.table_name
"#;

/// Check whether a table declares a column
pub const COLUMN_EXISTS: &str = r#"
    SELECT EXISTS(
        SELECT 1
        FROM information_schema.columns c
        WHERE c.table_schema::text = $1::text
            AND c.table_name::text = $2::text
            AND c.column_name::text = $3::text
    ) AS present
"#;

/// SQL builder for safe identifier quoting
pub struct SqlBuilder;

impl SqlBuilder {
    /// Quote an identifier (table/column name) safely
    pub fn quote_ident(ident: &str) -> String {
        // PostgreSQL identifier quoting
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Build the changed-since query for one table.
    ///
    /// The whole row comes back as JSONB so arbitrary tables can be read
    /// without knowing their columns; `$1` is the cutoff as a
    /// `timestamp`.
    pub fn changed_since(schema: &str, table: &str, column: &str) -> String {
        let column = Self::quote_ident(column);
        format!(
            "SELECT to_jsonb(t) AS record, t.{col}::text AS last_edited \
             FROM {schema}.{table} t \
             WHERE t.{col} > $1::timestamp \
             ORDER BY t.{col}",
            col = column,
            schema = Self::quote_ident(schema),
            table = Self::quote_ident(table),
        )
    }
}
