//! Fluent SQL query builder.
//!
//! A [`QueryBuilder`] accumulates clause fragments and a positionally-aligned
//! parameter list, then hands the whole state to a
//! [`Grammar`](crate::Grammar) for compilation and to a
//! [`Connection`](crate::Connection) for execution.
//!
//! Builders are plain values: fluent methods consume and return `self`, and
//! execution methods work on `&self` so a builder can be reused. Operations
//! that need a temporary shape (aggregates, pagination counts) run on a
//! clone, which leaves the original untouched.
//!
//! # Example
//!
//! ```
//! use sable_query::{Grammar, QueryBuilder};
//!
//! let query = QueryBuilder::table("users")
//!     .where_eq("active", true)
//!     .where_nested(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"))
//!     .order_by("name")
//!     .limit(10);
//!
//! let sql = query.to_sql(&Grammar::new());
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM `users` WHERE `active` = ? AND (`role` = ? OR `role` = ?) \
//!      ORDER BY `name` ASC LIMIT 10"
//! );
//! ```

use std::collections::BTreeMap;

use crate::clause::{
    Aggregate, AggregateFunction, Column, Connector, Direction, Having, HavingClause, JoinBuilder,
    JoinClause, JoinCondition, JoinConstraint, JoinKind, OrderClause, Where, WhereClause,
};
use crate::connection::{Connection, Row};
use crate::error::{QueryError, Result};
use crate::expression::Expression;
use crate::grammar::Grammar;
use crate::operator::Operator;
use crate::value::{IntoValue, Operand, Value};

/// A single insert/update record: column name to operand, in column order.
pub type Record = BTreeMap<String, Operand>;

/// Builds a [`Record`] from `(column, value)` pairs.
pub fn record<'a, I, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<Operand>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect()
}

/// Parameter bindings, grouped by the clause section that produced them.
///
/// Flattening concatenates the sections in the fixed order the grammar emits
/// placeholders: select, join, where, having, order.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub(crate) select: Vec<Value>,
    pub(crate) join: Vec<Value>,
    pub(crate) wheres: Vec<Value>,
    pub(crate) having: Vec<Value>,
    pub(crate) order: Vec<Value>,
}

impl Bindings {
    /// Returns all bindings in placeholder order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Value> {
        let mut out =
            Vec::with_capacity(self.select.len() + self.join.len() + self.wheres.len()
                + self.having.len() + self.order.len());
        out.extend(self.select.iter().cloned());
        out.extend(self.join.iter().cloned());
        out.extend(self.wheres.iter().cloned());
        out.extend(self.having.iter().cloned());
        out.extend(self.order.iter().cloned());
        out
    }
}

/// Page of rows plus totals, produced by [`QueryBuilder::paginate`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct Paginator {
    pub data: Vec<Row>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

/// Page of rows plus a has-more flag, produced by
/// [`QueryBuilder::simple_paginate`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimplePaginator {
    pub data: Vec<Row>,
    pub per_page: i64,
    pub current_page: i64,
    pub has_more: bool,
}

/// A mutable, fluent SQL query under construction.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) columns: Option<Vec<Column>>,
    pub(crate) distinct: bool,
    pub(crate) from: String,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<Where>,
    pub(crate) groups: Vec<String>,
    pub(crate) havings: Vec<Having>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) bindings: Bindings,
}

impl QueryBuilder {
    /// Creates an empty builder with no table set; used for sub-selects
    /// where the closure picks its own `from`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder targeting the given table.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    /// Sets the table the query targets.
    #[must_use]
    pub fn from(mut self, table: &str) -> Self {
        self.from = table.to_string();
        self
    }

    /// Returns the table the query targets.
    #[must_use]
    pub fn from_table(&self) -> &str {
        &self.from
    }

    /// Returns all bindings in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<Value> {
        self.bindings.flatten()
    }

    /// Compiles the query to SQL with the given grammar.
    #[must_use]
    pub fn to_sql(&self, grammar: &Grammar) -> String {
        grammar.compile_select(self)
    }

    // ---- select ----------------------------------------------------------

    /// Replaces the select list.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| Column::Name((*c).to_string())).collect());
        self
    }

    /// Appends columns to the select list.
    #[must_use]
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        let added = columns.iter().map(|c| Column::Name((*c).to_string()));
        match self.columns.as_mut() {
            Some(cols) => cols.extend(added),
            None => self.columns = Some(added.collect()),
        }
        self
    }

    /// Appends a raw select fragment with its bindings.
    #[must_use]
    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        let col = Column::Raw(Expression::new(sql));
        match self.columns.as_mut() {
            Some(cols) => cols.push(col),
            None => self.columns = Some(vec![col]),
        }
        self.bindings.select.extend(bindings);
        self
    }

    /// Makes the query return distinct rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ---- where -----------------------------------------------------------

    /// Adds an `AND column op value` predicate.
    ///
    /// The operator is parsed against the recognized comparison set. A NULL
    /// value degrades to `IS NULL` under `=` and `IS NOT NULL` under
    /// `!=`/`<>`; any other operator combined with NULL is an error.
    pub fn where_(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        let op = Operator::parse(operator)?;
        self.add_where(column, op, value.into(), Connector::And)
    }

    /// Adds an `OR column op value` predicate.
    pub fn or_where(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        let op = Operator::parse(operator)?;
        self.add_where(column, op, value.into(), Connector::Or)
    }

    /// Adds an `AND column = value` predicate (two-argument shorthand).
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Operand>) -> Self {
        self = self.push_basic(column, Operator::Eq, value.into(), Connector::And);
        self
    }

    /// Adds an `OR column = value` predicate.
    #[must_use]
    pub fn or_where_eq(mut self, column: &str, value: impl Into<Operand>) -> Self {
        self = self.push_basic(column, Operator::Eq, value.into(), Connector::Or);
        self
    }

    /// Expands `(column, value)` pairs into an AND-nested group of equality
    /// predicates, preserving insertion order.
    #[must_use]
    pub fn where_all<'a, I, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Operand>,
    {
        self.where_nested(|q| {
            pairs
                .into_iter()
                .fold(q, |q, (column, value)| q.where_eq(column, value))
        })
    }

    /// Adds a parenthesized predicate group built by the closure.
    ///
    /// The closure receives a fresh builder sharing this query's table. The
    /// group is appended only if the closure added at least one predicate;
    /// its bindings merge into this builder in order.
    #[must_use]
    pub fn where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let sub = f(QueryBuilder::table(&self.from));
        self.add_nested(sub, Connector::And)
    }

    /// Adds an OR-connected parenthesized predicate group.
    #[must_use]
    pub fn or_where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let sub = f(QueryBuilder::table(&self.from));
        self.add_nested(sub, Connector::Or)
    }

    /// Adds a `column op (subquery)` predicate against a scalar sub-select.
    pub fn where_sub<F>(mut self, column: &str, operator: &str, f: F) -> Result<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let op = Operator::parse(operator)?;
        let sub = f(QueryBuilder::new());
        self.bindings.wheres.extend(sub.bindings.flatten());
        self.wheres.push(Where {
            connector: Connector::And,
            clause: WhereClause::Sub {
                column: column.to_string(),
                operator: op,
                query: Box::new(sub),
            },
        });
        Ok(self)
    }

    /// Adds an `AND column IN (values...)` predicate.
    #[must_use]
    pub fn where_in<V: IntoValue>(self, column: &str, values: Vec<V>) -> Self {
        self.add_where_in(column, values, false, Connector::And)
    }

    /// Adds an `AND column NOT IN (values...)` predicate.
    #[must_use]
    pub fn where_not_in<V: IntoValue>(self, column: &str, values: Vec<V>) -> Self {
        self.add_where_in(column, values, true, Connector::And)
    }

    /// Adds an `OR column IN (values...)` predicate.
    #[must_use]
    pub fn or_where_in<V: IntoValue>(self, column: &str, values: Vec<V>) -> Self {
        self.add_where_in(column, values, false, Connector::Or)
    }

    /// Adds an `AND column IN (subquery)` predicate.
    #[must_use]
    pub fn where_in_sub<F>(self, column: &str, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.add_where_in_sub(column, f, false)
    }

    /// Adds an `AND column NOT IN (subquery)` predicate.
    #[must_use]
    pub fn where_not_in_sub<F>(self, column: &str, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.add_where_in_sub(column, f, true)
    }

    /// Adds an `AND column BETWEEN low AND high` predicate.
    #[must_use]
    pub fn where_between(mut self, column: &str, low: impl IntoValue, high: impl IntoValue) -> Self {
        let (low, high) = (low.into_value(), high.into_value());
        self.bindings.wheres.push(low.clone());
        self.bindings.wheres.push(high.clone());
        self.wheres.push(Where {
            connector: Connector::And,
            clause: WhereClause::Between {
                column: column.to_string(),
                low,
                high,
                negated: false,
            },
        });
        self
    }

    /// Adds an `AND column NOT BETWEEN low AND high` predicate.
    #[must_use]
    pub fn where_not_between(
        mut self,
        column: &str,
        low: impl IntoValue,
        high: impl IntoValue,
    ) -> Self {
        let (low, high) = (low.into_value(), high.into_value());
        self.bindings.wheres.push(low.clone());
        self.bindings.wheres.push(high.clone());
        self.wheres.push(Where {
            connector: Connector::And,
            clause: WhereClause::Between {
                column: column.to_string(),
                low,
                high,
                negated: true,
            },
        });
        self
    }

    /// Adds an `AND column IS NULL` predicate.
    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        self.add_where_null(column, false, Connector::And)
    }

    /// Adds an `AND column IS NOT NULL` predicate.
    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        self.add_where_null(column, true, Connector::And)
    }

    /// Adds an `OR column IS NULL` predicate.
    #[must_use]
    pub fn or_where_null(self, column: &str) -> Self {
        self.add_where_null(column, false, Connector::Or)
    }

    /// Adds an `OR column IS NOT NULL` predicate.
    #[must_use]
    pub fn or_where_not_null(self, column: &str) -> Self {
        self.add_where_null(column, true, Connector::Or)
    }

    /// Adds a raw `AND` predicate with its bindings.
    #[must_use]
    pub fn where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.wheres.extend(bindings);
        self.wheres.push(Where {
            connector: Connector::And,
            clause: WhereClause::Raw { sql: sql.to_string() },
        });
        self
    }

    /// Adds a raw `OR` predicate with its bindings.
    #[must_use]
    pub fn or_where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.wheres.extend(bindings);
        self.wheres.push(Where {
            connector: Connector::Or,
            clause: WhereClause::Raw { sql: sql.to_string() },
        });
        self
    }

    fn add_where(
        self,
        column: &str,
        op: Operator,
        operand: Operand,
        connector: Connector,
    ) -> Result<Self> {
        if operand.is_null() && !matches!(op, Operator::Eq | Operator::Ne) {
            return Err(QueryError::NullComparison(op.as_sql().to_string()));
        }
        Ok(self.push_basic(column, op, operand, connector))
    }

    fn push_basic(
        mut self,
        column: &str,
        op: Operator,
        operand: Operand,
        connector: Connector,
    ) -> Self {
        if operand.is_null() {
            return self.add_where_null(column, op == Operator::Ne, connector);
        }
        if let Operand::Value(v) = &operand {
            self.bindings.wheres.push(v.clone());
        }
        self.wheres.push(Where {
            connector,
            clause: WhereClause::Basic {
                column: column.to_string(),
                operator: op,
                value: operand,
            },
        });
        self
    }

    fn add_nested(mut self, sub: QueryBuilder, connector: Connector) -> Self {
        if sub.wheres.is_empty() {
            return self;
        }
        self.bindings.wheres.extend(sub.bindings.flatten());
        self.wheres.push(Where {
            connector,
            clause: WhereClause::Nested { query: Box::new(sub) },
        });
        self
    }

    fn add_where_in<V: IntoValue>(
        mut self,
        column: &str,
        values: Vec<V>,
        negated: bool,
        connector: Connector,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(IntoValue::into_value).collect();
        self.bindings.wheres.extend(values.iter().cloned());
        self.wheres.push(Where {
            connector,
            clause: WhereClause::In {
                column: column.to_string(),
                values,
                negated,
            },
        });
        self
    }

    fn add_where_in_sub<F>(mut self, column: &str, f: F, negated: bool) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let sub = f(QueryBuilder::new());
        self.bindings.wheres.extend(sub.bindings.flatten());
        self.wheres.push(Where {
            connector: Connector::And,
            clause: WhereClause::InSub {
                column: column.to_string(),
                query: Box::new(sub),
                negated,
            },
        });
        self
    }

    fn add_where_null(mut self, column: &str, negated: bool, connector: Connector) -> Self {
        self.wheres.push(Where {
            connector,
            clause: WhereClause::Null {
                column: column.to_string(),
                negated,
            },
        });
        self
    }

    // ---- joins -----------------------------------------------------------

    /// Adds an `INNER JOIN table ON first op second` clause.
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Result<Self> {
        self.add_join(JoinKind::Inner, table, first, operator, second)
    }

    /// Adds an `INNER JOIN table ON first = second` clause, the common
    /// equality form.
    #[must_use]
    pub fn inner_join(mut self, table: &str, first: &str, second: &str) -> Self {
        self.joins.push(JoinClause {
            kind: JoinKind::Inner,
            table: table.to_string(),
            conditions: vec![JoinCondition {
                connector: Connector::And,
                constraint: JoinConstraint::On {
                    first: first.to_string(),
                    operator: Operator::Eq,
                    second: second.to_string(),
                },
            }],
        });
        self
    }

    /// Adds a `LEFT JOIN table ON first op second` clause.
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Result<Self> {
        self.add_join(JoinKind::Left, table, first, operator, second)
    }

    /// Adds a `RIGHT JOIN table ON first op second` clause.
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Result<Self> {
        self.add_join(JoinKind::Right, table, first, operator, second)
    }

    /// Adds an `INNER JOIN table ON column op ?` clause with a bound value.
    pub fn join_where(
        mut self,
        table: &str,
        column: &str,
        operator: &str,
        value: impl IntoValue,
    ) -> Result<Self> {
        let op = Operator::parse(operator)?;
        let value = value.into_value();
        self.bindings.join.push(value.clone());
        self.joins.push(JoinClause {
            kind: JoinKind::Inner,
            table: table.to_string(),
            conditions: vec![JoinCondition {
                connector: Connector::And,
                constraint: JoinConstraint::Where {
                    column: column.to_string(),
                    operator: op,
                    value,
                },
            }],
        });
        Ok(self)
    }

    /// Adds an `INNER JOIN` with compound constraints built by the closure.
    #[must_use]
    pub fn join_on<F>(mut self, table: &str, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        let join = f(JoinBuilder::default());
        self.bindings.join.extend(join.bindings);
        self.joins.push(JoinClause {
            kind: JoinKind::Inner,
            table: table.to_string(),
            conditions: join.conditions,
        });
        self
    }

    fn add_join(
        mut self,
        kind: JoinKind,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        let op = Operator::parse(operator)?;
        self.joins.push(JoinClause {
            kind,
            table: table.to_string(),
            conditions: vec![JoinCondition {
                connector: Connector::And,
                constraint: JoinConstraint::On {
                    first: first.to_string(),
                    operator: op,
                    second: second.to_string(),
                },
            }],
        });
        Ok(self)
    }

    // ---- group / having / order / paging ---------------------------------

    /// Appends columns to the GROUP BY list.
    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.groups.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    /// Adds an `AND column op value` having predicate.
    pub fn having(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_having(column, operator, value.into(), Connector::And)
    }

    /// Adds an `OR column op value` having predicate.
    pub fn or_having(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_having(column, operator, value.into(), Connector::Or)
    }

    /// Adds a raw having predicate with its bindings.
    #[must_use]
    pub fn having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.having.extend(bindings);
        self.havings.push(Having {
            connector: Connector::And,
            clause: HavingClause::Raw { sql: sql.to_string() },
        });
        self
    }

    fn add_having(
        mut self,
        column: &str,
        operator: &str,
        operand: Operand,
        connector: Connector,
    ) -> Result<Self> {
        let op = Operator::parse(operator)?;
        if let Operand::Value(v) = &operand {
            self.bindings.having.push(v.clone());
        }
        self.havings.push(Having {
            connector,
            clause: HavingClause::Basic {
                column: column.to_string(),
                operator: op,
                value: operand,
            },
        });
        Ok(self)
    }

    /// Appends an ascending ORDER BY entry.
    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        self.orders.push(OrderClause::Column {
            column: column.to_string(),
            direction: Direction::Asc,
        });
        self
    }

    /// Appends a descending ORDER BY entry.
    #[must_use]
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.orders.push(OrderClause::Column {
            column: column.to_string(),
            direction: Direction::Desc,
        });
        self
    }

    /// Appends a raw ORDER BY fragment with its bindings.
    #[must_use]
    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.order.extend(bindings);
        self.orders.push(OrderClause::Raw { sql: sql.to_string() });
        self
    }

    /// Sets the LIMIT. Negative values are ignored.
    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        if n >= 0 {
            self.limit = Some(n);
        }
        self
    }

    /// Alias for [`QueryBuilder::limit`].
    #[must_use]
    pub fn take(self, n: i64) -> Self {
        self.limit(n)
    }

    /// Sets the OFFSET. Negative values clamp to zero.
    #[must_use]
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n.max(0));
        self
    }

    /// Alias for [`QueryBuilder::offset`].
    #[must_use]
    pub fn skip(self, n: i64) -> Self {
        self.offset(n)
    }
}

// ---- execution -----------------------------------------------------------

impl QueryBuilder {
    /// Executes the query and returns all matching rows.
    pub async fn get(&self, conn: &dyn Connection) -> Result<Vec<Row>> {
        let sql = conn.grammar().compile_select(self);
        conn.select(&sql, &self.bindings.flatten()).await
    }

    /// Returns the first matching row, if any.
    pub async fn first(&self, conn: &dyn Connection) -> Result<Option<Row>> {
        let rows = self.clone().limit(1).get(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// Returns the row whose `id` column equals the given key.
    pub async fn find(&self, conn: &dyn Connection, id: impl IntoValue) -> Result<Option<Row>> {
        self.clone().where_eq("id", id.into_value()).first(conn).await
    }

    /// Returns a single column of the first matching row.
    pub async fn pluck(&self, conn: &dyn Connection, column: &str) -> Result<Option<Value>> {
        let row = self.clone().select(&[column]).first(conn).await?;
        Ok(row.and_then(|r| take_column(r, column)))
    }

    /// Returns a single column of every matching row.
    pub async fn lists(&self, conn: &dyn Connection, column: &str) -> Result<Vec<Value>> {
        let rows = self.clone().select(&[column]).get(conn).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| take_column(r, column))
            .collect())
    }

    /// Returns whether any row matches.
    pub async fn exists(&self, conn: &dyn Connection) -> Result<bool> {
        Ok(self.count(conn).await? > 0)
    }

    /// Executes `COUNT(*)` with the current constraints.
    pub async fn count(&self, conn: &dyn Connection) -> Result<i64> {
        let value = self
            .aggregate_value(conn, AggregateFunction::Count, &["*"])
            .await?;
        Ok(value.to_i64().unwrap_or(0))
    }

    /// Executes `MIN(column)` with the current constraints.
    pub async fn min(&self, conn: &dyn Connection, column: &str) -> Result<Value> {
        self.aggregate_value(conn, AggregateFunction::Min, &[column]).await
    }

    /// Executes `MAX(column)` with the current constraints.
    pub async fn max(&self, conn: &dyn Connection, column: &str) -> Result<Value> {
        self.aggregate_value(conn, AggregateFunction::Max, &[column]).await
    }

    /// Executes `SUM(column)`; an empty result reads as zero.
    pub async fn sum(&self, conn: &dyn Connection, column: &str) -> Result<Value> {
        let value = self
            .aggregate_value(conn, AggregateFunction::Sum, &[column])
            .await?;
        Ok(match value {
            Value::Null => Value::Int(0),
            other => other,
        })
    }

    /// Executes `AVG(column)` with the current constraints.
    pub async fn avg(&self, conn: &dyn Connection, column: &str) -> Result<Value> {
        self.aggregate_value(conn, AggregateFunction::Avg, &[column]).await
    }

    async fn aggregate_value(
        &self,
        conn: &dyn Connection,
        function: AggregateFunction,
        columns: &[&str],
    ) -> Result<Value> {
        let mut query = self.clone();
        query.aggregate = Some(Aggregate {
            function,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        });
        query.columns = None;
        let rows = query.get(conn).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| take_column(row, "aggregate"))
            .unwrap_or(Value::Null))
    }

    /// Counts matching rows while ignoring ordering and paging, which must
    /// not affect a pagination total. The builder itself is untouched.
    pub async fn pagination_count(&self, conn: &dyn Connection) -> Result<i64> {
        let mut query = self.clone();
        query.orders.clear();
        query.limit = None;
        query.offset = None;
        query.bindings.order.clear();
        query.count(conn).await
    }

    /// Fetches one page of results plus the total row count.
    pub async fn paginate(
        &self,
        conn: &dyn Connection,
        page: i64,
        per_page: i64,
    ) -> Result<Paginator> {
        let page = page.max(1);
        let total = self.pagination_count(conn).await?;
        let data = self
            .clone()
            .offset((page - 1) * per_page)
            .limit(per_page)
            .get(conn)
            .await?;
        let last_page = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };
        Ok(Paginator {
            data,
            total,
            per_page,
            current_page: page,
            last_page,
        })
    }

    /// Fetches one page of results plus a has-more flag, skipping the count
    /// query entirely.
    pub async fn simple_paginate(
        &self,
        conn: &dyn Connection,
        page: i64,
        per_page: i64,
    ) -> Result<SimplePaginator> {
        let page = page.max(1);
        let mut data = self
            .clone()
            .offset((page - 1) * per_page)
            .limit(per_page + 1)
            .get(conn)
            .await?;
        let has_more = data.len() as i64 > per_page;
        data.truncate(per_page.max(0) as usize);
        Ok(SimplePaginator {
            data,
            per_page,
            current_page: page,
            has_more,
        })
    }

    /// Inserts one or more records. Returns the driver's success flag.
    pub async fn insert(&self, conn: &dyn Connection, records: &[Record]) -> Result<bool> {
        if records.is_empty() {
            return Ok(true);
        }
        let sql = conn.grammar().compile_insert(self, records);
        conn.insert(&sql, &insert_bindings(records)).await
    }

    /// Inserts a record and returns the new primary-key value, cast to an
    /// integer when the driver reports a numeric string.
    pub async fn insert_get_id(
        &self,
        conn: &dyn Connection,
        record: &Record,
        sequence: Option<&str>,
    ) -> Result<Value> {
        let records = std::slice::from_ref(record);
        let sql = conn.grammar().compile_insert(self, records);
        conn.insert(&sql, &insert_bindings(records)).await?;
        let id = conn.last_insert_id(sequence).await?;
        Ok(numeric_cast(id))
    }

    /// Updates matching rows; returns the affected-row count.
    pub async fn update(&self, conn: &dyn Connection, record: &Record) -> Result<u64> {
        let sql = conn.grammar().compile_update(self, record);
        let mut bindings: Vec<Value> = record
            .values()
            .filter_map(|op| match op {
                Operand::Value(v) => Some(v.clone()),
                Operand::Raw(_) => None,
            })
            .collect();
        bindings.extend(self.bindings.join.iter().cloned());
        bindings.extend(self.bindings.wheres.iter().cloned());
        conn.update(&sql, &bindings).await
    }

    /// Increments a column by the given amount, applying any update values.
    pub async fn increment(&self, conn: &dyn Connection, column: &str, amount: i64) -> Result<u64> {
        let wrapped = conn.grammar().wrap(column);
        let mut record = Record::new();
        record.insert(
            column.to_string(),
            Operand::Raw(Expression::new(format!("{wrapped} + {amount}"))),
        );
        self.update(conn, &record).await
    }

    /// Decrements a column by the given amount.
    pub async fn decrement(&self, conn: &dyn Connection, column: &str, amount: i64) -> Result<u64> {
        let wrapped = conn.grammar().wrap(column);
        let mut record = Record::new();
        record.insert(
            column.to_string(),
            Operand::Raw(Expression::new(format!("{wrapped} - {amount}"))),
        );
        self.update(conn, &record).await
    }

    /// Deletes matching rows; returns the affected-row count.
    pub async fn delete(&self, conn: &dyn Connection) -> Result<u64> {
        let sql = conn.grammar().compile_delete(self);
        conn.delete(&sql, &self.bindings.wheres).await
    }
}

/// Collects bindable values from insert records, skipping raw expressions,
/// in the same column order the grammar compiles.
fn insert_bindings(records: &[Record]) -> Vec<Value> {
    let mut out = Vec::new();
    let Some(first) = records.first() else {
        return out;
    };
    let columns: Vec<&String> = first.keys().collect();
    for record in records {
        for column in &columns {
            match record.get(*column) {
                Some(Operand::Value(v)) => out.push(v.clone()),
                Some(Operand::Raw(_)) => {}
                None => out.push(Value::Null),
            }
        }
    }
    out
}

/// Reads a column out of a row, tolerating qualified names and the
/// case-normalized aggregate alias.
fn take_column(mut row: Row, column: &str) -> Option<Value> {
    let key = column.rsplit('.').next().unwrap_or(column);
    if let Some(v) = row.remove(key) {
        return Some(v);
    }
    if let Some(v) = row.remove(&key.to_ascii_uppercase()) {
        return Some(v);
    }
    row.into_values().next()
}

fn numeric_cast(value: Value) -> Value {
    match value {
        Value::Text(s) => match s.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => match s.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Text(s),
            },
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::raw;

    #[test]
    fn test_where_pushes_one_binding_per_scalar() {
        let q = QueryBuilder::table("users")
            .where_("age", ">", 18)
            .unwrap()
            .where_eq("name", "Alice");
        assert_eq!(q.bindings(), vec![Value::Int(18), Value::Text("Alice".into())]);
        assert_eq!(q.wheres.len(), 2);
    }

    #[test]
    fn test_expression_values_never_bind() {
        let q = QueryBuilder::table("users").where_eq("updated_at", raw("created_at"));
        assert!(q.bindings().is_empty());
        assert_eq!(q.wheres.len(), 1);
    }

    #[test]
    fn test_invalid_operator_is_an_error() {
        let err = QueryBuilder::table("users").where_("age", "~~", 1).unwrap_err();
        assert!(matches!(err, QueryError::InvalidOperator(_)));
    }

    #[test]
    fn test_null_value_degrades_to_null_clause() {
        let q = QueryBuilder::table("users")
            .where_("deleted_at", "=", Value::Null)
            .unwrap();
        assert!(matches!(
            q.wheres[0].clause,
            WhereClause::Null { negated: false, .. }
        ));
        assert!(q.bindings().is_empty());

        let q = QueryBuilder::table("users")
            .where_("deleted_at", "!=", Value::Null)
            .unwrap();
        assert!(matches!(
            q.wheres[0].clause,
            WhereClause::Null { negated: true, .. }
        ));
    }

    #[test]
    fn test_null_with_ordering_operator_is_an_error() {
        let err = QueryBuilder::table("users")
            .where_("age", ">", Value::Null)
            .unwrap_err();
        assert!(matches!(err, QueryError::NullComparison(_)));
    }

    #[test]
    fn test_empty_nested_group_is_dropped() {
        let q = QueryBuilder::table("users").where_nested(|q| q);
        assert!(q.wheres.is_empty());
    }

    #[test]
    fn test_nested_bindings_merge_in_order() {
        let q = QueryBuilder::table("users")
            .where_eq("a", 1)
            .where_nested(|q| q.where_eq("b", 2).or_where_eq("c", 3))
            .where_eq("d", 4);
        assert_eq!(
            q.bindings(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
    }

    #[test]
    fn test_where_all_preserves_insertion_order() {
        let q = QueryBuilder::table("users").where_all(vec![("b", 2), ("a", 1)]);
        assert_eq!(q.wheres.len(), 1);
        let WhereClause::Nested { query } = &q.wheres[0].clause else {
            panic!("expected nested clause");
        };
        assert_eq!(query.wheres.len(), 2);
        assert_eq!(q.bindings(), vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_offset_clamps_negative_to_zero() {
        let q = QueryBuilder::table("users").offset(-5);
        assert_eq!(q.offset, Some(0));
        let q = QueryBuilder::table("users").limit(-1);
        assert_eq!(q.limit, None);
    }

    #[test]
    fn test_join_bindings_precede_where_bindings() {
        let q = QueryBuilder::table("users")
            .where_eq("a", 1)
            .join_where("orders", "orders.status", "=", "open")
            .unwrap();
        assert_eq!(
            q.bindings(),
            vec![Value::Text("open".into()), Value::Int(1)]
        );
    }

    #[test]
    fn test_record_helper_orders_columns() {
        let r = record(vec![("b", 2), ("a", 1)]);
        let cols: Vec<&String> = r.keys().collect();
        assert_eq!(cols, ["a", "b"]);
    }
}
