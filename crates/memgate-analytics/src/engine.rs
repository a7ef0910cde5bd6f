//! Analytics engine using DuckDB for full-table source scans.

use crate::error::{AnalyticsError, Result};
use duckdb::Connection;
use duckdb::types::Value;
use memgate_domain::{ROW_DELIMITER, TableRef};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// DuckDB-based analytical source.
///
/// Clones share one connection; queries are serialized on it.
#[derive(Clone)]
pub struct AnalyticsEngine {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl AnalyticsEngine {
    /// Create a new in-memory analytics engine.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Create analytics engine with persistent storage.
    pub fn new_persistent<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run one or more SQL statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Replace `table` with the contents of a CSV file. Every column is
    /// loaded as text so rows render exactly as they appear in the file.
    pub fn import_csv<P: AsRef<Path>>(&self, table: &TableRef, path: P) -> Result<i64> {
        let path = sql_path(path.as_ref())?;
        self.ensure_schema(table)?;
        self.execute_batch(&format!(
            "CREATE OR REPLACE TABLE {table} AS \
             SELECT * FROM read_csv_auto('{path}', header = true, all_varchar = true)"
        ))?;
        let count = self.row_count(table)?;
        tracing::info!(%table, rows = count, "Imported CSV");
        Ok(count)
    }

    /// Replace `table` with the contents of a Parquet file.
    pub fn import_parquet<P: AsRef<Path>>(&self, table: &TableRef, path: P) -> Result<i64> {
        let path = sql_path(path.as_ref())?;
        self.ensure_schema(table)?;
        self.execute_batch(&format!(
            "CREATE OR REPLACE TABLE {table} AS SELECT * FROM read_parquet('{path}')"
        ))?;
        let count = self.row_count(table)?;
        tracing::info!(%table, rows = count, "Imported Parquet");
        Ok(count)
    }

    /// Export `table` to a Parquet file.
    pub fn export_parquet<P: AsRef<Path>>(&self, table: &TableRef, path: P) -> Result<()> {
        let path = sql_path(path.as_ref())?;
        self.execute_batch(&format!("COPY {table} TO '{path}' (FORMAT PARQUET)"))
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &TableRef) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(count)
    }

    /// Run a `SELECT ... FROM ...` query and render every row as its fields
    /// joined with the row delimiter.
    ///
    /// A row with a field that cannot be rendered as text is logged and
    /// dropped; iteration continues with the next row.
    ///
    /// The `SELECT` and `FROM ` keywords are matched case-sensitively:
    /// `select * from t` is rejected with
    /// [`AnalyticsError::InvalidParameter`]. Queries built with
    /// `SourceQuery` always use upper case.
    pub fn query_rows(&self, query: &str) -> Result<Vec<String>> {
        validate_select(query)?;
        tracing::debug!(%query, "Querying analytical source");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(query)?;
        let mut rows = stmt.query([])?;
        let width = rows.as_ref().map_or(0, |stmt| stmt.column_count());

        let mut out = Vec::new();
        let mut dropped = 0usize;
        while let Some(row) = rows.next()? {
            let fields = (0..width)
                .map(|i| row.get::<_, Value>(i).map_err(AnalyticsError::from))
                .map(|value| value.and_then(render_field))
                .collect::<Result<Vec<String>>>();

            match fields {
                Ok(fields) => {
                    if fields.iter().any(|f| f.contains(ROW_DELIMITER)) {
                        tracing::warn!(
                            row = out.len() + dropped,
                            "Field contains the row delimiter; columns will shift"
                        );
                    }
                    out.push(fields.join(&ROW_DELIMITER.to_string()));
                }
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(error = %e, "Dropping undecodable source row");
                }
            }
        }

        tracing::info!(rows = out.len(), dropped, "Analytical query complete");
        Ok(out)
    }

    fn ensure_schema(&self, table: &TableRef) -> Result<()> {
        if let Some(schema) = table.schema_ident() {
            self.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))?;
        }
        Ok(())
    }
}

fn validate_select(query: &str) -> Result<()> {
    let trimmed = query.trim_start();
    if !trimmed.starts_with("SELECT") {
        return Err(AnalyticsError::InvalidParameter(format!(
            "malformed select: {query}"
        )));
    }
    if !trimmed.contains("FROM ") {
        return Err(AnalyticsError::InvalidParameter(format!(
            "query has no FROM clause: {query}"
        )));
    }
    Ok(())
}

fn sql_path(path: &Path) -> Result<String> {
    let path = path
        .to_str()
        .ok_or_else(|| AnalyticsError::Query(format!("non UTF-8 path {}", path.display())))?;
    Ok(path.replace('\'', "''"))
}

fn render_field(value: Value) -> Result<String> {
    let text = match value {
        Value::Null => String::new(),
        Value::Boolean(b) => b.to_string(),
        Value::TinyInt(n) => n.to_string(),
        Value::SmallInt(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::HugeInt(n) => n.to_string(),
        Value::UTinyInt(n) => n.to_string(),
        Value::USmallInt(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::UBigInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::Decimal(n) => n.to_string(),
        Value::Text(s) => s,
        other => {
            return Err(AnalyticsError::Conversion(format!(
                "cannot render {other:?} as text"
            )));
        }
    };
    Ok(text)
}
