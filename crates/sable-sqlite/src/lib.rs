//! # sable-sqlite
//!
//! A [`Connection`] implementation over `sqlx`'s SQLite pool.
//!
//! SQLite quirks handled here:
//! - Identifiers quote with double quotes, not backticks.
//! - Rows come back through SQLite's type affinity; values are decoded by
//!   probing each column's reported type (`INTEGER`, `REAL`, `BLOB`,
//!   anything else reads as text).
//! - `last_insert_rowid` is per-connection state; the adapter captures it
//!   from each insert result so the id survives pooling.
//!
//! ## Example
//!
//! ```ignore
//! use sable_query::QueryBuilder;
//! use sable_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let users = QueryBuilder::table("users").where_eq("active", true).get(&conn).await?;
//! ```

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use sable_query::{Connection, Grammar, QueryError, Result, Row, Value};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::SqlitePool;

/// A pooled SQLite connection.
pub struct SqliteConnection {
    pool: SqlitePool,
    grammar: Grammar,
    last_id: AtomicI64,
}

impl SqliteConnection {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            grammar: Grammar::new().with_quote('"'),
            last_id: AtomicI64::new(0),
        }
    }

    /// Opens a single-connection pool for the given URL.
    ///
    /// One connection keeps in-memory databases coherent across queries.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(QueryError::connection)?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn build<'q>(
        sql: &'q str,
        bindings: &[Value],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value(query, value);
        }
        query
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!(%sql, bindings = bindings.len(), "select");
        let rows = Self::build(sql, bindings)
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::connection)?;
        rows.iter().map(decode_row).collect()
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        tracing::debug!(%sql, bindings = bindings.len(), "insert");
        let result = Self::build(sql, bindings)
            .execute(&self.pool)
            .await
            .map_err(QueryError::connection)?;
        self.last_id.store(result.last_insert_rowid(), Ordering::SeqCst);
        Ok(true)
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        tracing::debug!(%sql, bindings = bindings.len(), "update");
        let result = Self::build(sql, bindings)
            .execute(&self.pool)
            .await
            .map_err(QueryError::connection)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        tracing::debug!(%sql, bindings = bindings.len(), "delete");
        let result = Self::build(sql, bindings)
            .execute(&self.pool)
            .await
            .map_err(QueryError::connection)?;
        Ok(result.rows_affected())
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        tracing::debug!(%sql, bindings = bindings.len(), "statement");
        Self::build(sql, bindings)
            .execute(&self.pool)
            .await
            .map_err(QueryError::connection)?;
        Ok(true)
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<Value> {
        Ok(Value::Int(self.last_id.load(Ordering::SeqCst)))
    }

    fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(n) => query.bind(*n),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Blob(b) => query.bind(b.clone()),
        Value::DateTime(dt) => query.bind(*dt),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};

    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i).map_err(QueryError::connection)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::Int(row.try_get::<i64, _>(i).map_err(QueryError::connection)?),
                "REAL" => Value::Float(row.try_get::<f64, _>(i).map_err(QueryError::connection)?),
                "BLOB" => {
                    Value::Blob(row.try_get::<Vec<u8>, _>(i).map_err(QueryError::connection)?)
                }
                _ => Value::Text(row.try_get::<String, _>(i).map_err(QueryError::connection)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
