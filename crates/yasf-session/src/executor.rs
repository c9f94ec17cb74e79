//! The query-execution seam between an edit session and a database.

use std::path::Path;

use rusqlite::types::Value;
use yasf_error::{Result, YasfError};
use yasf_types::SqlValue;

/// Runs parameterised SQL for an edit session.
///
/// Parameters bind positionally to `?` placeholders.
pub trait SqlExecutor {
    /// Run a query and return every result row.
    ///
    /// # Errors
    ///
    /// Returns [`YasfError::Query`] if preparation or stepping fails.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>>;

    /// Run a statement and return the number of rows it changed.
    ///
    /// # Errors
    ///
    /// Returns [`YasfError::Query`] if the statement fails.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize>;

    /// Row identifier assigned by the most recent successful insert.
    fn last_insert_rowid(&self) -> i64;
}

/// [`SqlExecutor`] over a `rusqlite::Connection`.
#[derive(Debug)]
pub struct RusqliteExecutor {
    conn: rusqlite::Connection,
}

impl RusqliteExecutor {
    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| YasfError::query(":memory:", e.to_string()))?;
        Ok(Self { conn })
    }

    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| YasfError::query(path.display().to_string(), e.to_string()))?;
        Ok(Self { conn })
    }

    #[must_use]
    pub const fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// The wrapped connection, for statements outside an edit session.
    #[must_use]
    pub const fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// Run a batch of `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| YasfError::query(sql, e.to_string()))
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

impl SqlExecutor for RusqliteExecutor {
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        let err = |e: rusqlite::Error| YasfError::query(sql, e.to_string());
        let mut stmt = self.conn.prepare(sql).map_err(err)?;
        let col_count = stmt.column_count();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter().map(to_sqlite)), |row| {
                let mut vals = Vec::with_capacity(col_count);
                for i in 0..col_count {
                    vals.push(from_sqlite(row.get::<_, Value>(i)?));
                }
                Ok(vals)
            })
            .map_err(err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(err)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        self.conn
            .execute(sql, rusqlite::params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| YasfError::query(sql, e.to_string()))
    }

    fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }
}
