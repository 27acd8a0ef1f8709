//! The connection abstraction the builder executes against.
//!
//! The query layer never talks to a driver directly; a host supplies an
//! implementation of [`Connection`] (see the `sable-sqlite` crate for one).
//! Driver failures propagate unchanged and nothing is retried.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::grammar::Grammar;
use crate::value::Value;

/// A flat result row: column name to value.
pub type Row = BTreeMap<String, Value>;

/// Executes compiled SQL with positional bindings.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Runs a SELECT and returns the matching rows.
    async fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>>;

    /// Runs an INSERT; returns the driver's success flag.
    async fn insert(&self, sql: &str, bindings: &[Value]) -> Result<bool>;

    /// Runs an UPDATE; returns the affected-row count.
    async fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64>;

    /// Runs a DELETE; returns the affected-row count.
    async fn delete(&self, sql: &str, bindings: &[Value]) -> Result<u64>;

    /// Runs any other statement; returns the driver's success flag.
    async fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool>;

    /// Returns the primary key generated by the most recent insert.
    async fn last_insert_id(&self, sequence: Option<&str>) -> Result<Value>;

    /// Returns the grammar used to compile SQL for this connection.
    fn grammar(&self) -> &Grammar;
}
