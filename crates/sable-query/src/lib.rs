//! # sable-query
//!
//! A fluent SQL query builder with dialect-aware compilation.
//!
//! The crate separates three concerns:
//! - [`QueryBuilder`] accumulates clause fragments and a positionally
//!   aligned binding list.
//! - [`Grammar`] compiles that state to a SQL string in a fixed component
//!   order, quoting identifiers and emitting `?` placeholders.
//! - [`Connection`] is the execution seam a host implements; the builder
//!   hands it compiled SQL plus bindings and gets rows back.
//!
//! ## Quick start
//!
//! ```
//! use sable_query::{Grammar, QueryBuilder};
//!
//! let query = QueryBuilder::table("orders")
//!     .select(&["id", "total"])
//!     .where_eq("status", "open")
//!     .where_between("total", 10, 100)
//!     .order_by_desc("total");
//!
//! assert_eq!(
//!     query.to_sql(&Grammar::new()),
//!     "SELECT `id`, `total` FROM `orders` WHERE `status` = ? \
//!      AND `total` BETWEEN ? AND ? ORDER BY `total` DESC"
//! );
//! assert_eq!(query.bindings().len(), 3);
//! ```
//!
//! Raw fragments bypass quoting and binding via [`Expression`]:
//!
//! ```
//! use sable_query::{raw, Grammar, QueryBuilder};
//!
//! let query = QueryBuilder::table("users").where_eq("updated_at", raw("created_at"));
//! assert_eq!(
//!     query.to_sql(&Grammar::new()),
//!     "SELECT * FROM `users` WHERE `updated_at` = created_at"
//! );
//! assert!(query.bindings().is_empty());
//! ```

mod builder;
pub mod clause;
mod connection;
mod error;
mod expression;
mod grammar;
mod operator;
mod value;

pub use builder::{record, Bindings, Paginator, QueryBuilder, Record, SimplePaginator};
pub use clause::{Direction, JoinBuilder};
pub use connection::{Connection, Row};
pub use error::{QueryError, Result};
pub use expression::{raw, Expression};
pub use grammar::Grammar;
pub use operator::Operator;
pub use value::{IntoValue, Operand, Value};
