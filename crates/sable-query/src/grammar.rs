//! SQL compilation.
//!
//! A [`Grammar`] is a pure translator from accumulated [`QueryBuilder`]
//! state to a SQL string. It never mutates the builder and holds no state
//! beyond the table prefix and the identifier quote character (backtick by
//! default; adapters override it per dialect).

use crate::builder::{QueryBuilder, Record};
use crate::clause::{
    Aggregate, Column, Having, HavingClause, JoinClause, JoinConstraint, OrderClause, Where,
    WhereClause,
};
use crate::value::Operand;

/// Compiles builder state into dialect-specific SQL.
#[derive(Debug, Clone)]
pub struct Grammar {
    table_prefix: String,
    quote: char,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            quote: '`',
        }
    }
}

impl Grammar {
    /// Creates a grammar with backtick quoting and no table prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix applied to every table identifier.
    #[must_use]
    pub fn with_table_prefix(mut self, prefix: &str) -> Self {
        self.table_prefix = prefix.to_string();
        self
    }

    /// Sets the identifier quote character.
    #[must_use]
    pub const fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    // ---- statements ------------------------------------------------------

    /// Compiles a SELECT statement.
    ///
    /// Components are assembled in a fixed order; absent components are
    /// omitted. An installed aggregate suppresses the plain column list.
    #[must_use]
    pub fn compile_select(&self, query: &QueryBuilder) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(self.compile_columns(query));
        parts.push(format!("FROM {}", self.wrap_table(&query.from)));
        if !query.joins.is_empty() {
            parts.push(self.compile_joins(&query.joins));
        }
        if !query.wheres.is_empty() {
            parts.push(format!("WHERE {}", self.render_wheres(&query.wheres)));
        }
        if !query.groups.is_empty() {
            parts.push(format!("GROUP BY {}", self.columnize(&query.groups)));
        }
        if !query.havings.is_empty() {
            parts.push(format!("HAVING {}", self.render_havings(&query.havings)));
        }
        if !query.orders.is_empty() {
            parts.push(self.compile_orders(&query.orders));
        }
        if let Some(limit) = query.limit {
            parts.push(format!("LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            parts.push(format!("OFFSET {offset}"));
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ").trim().to_string()
    }

    /// Compiles a multi-row INSERT statement. Column order follows the first
    /// record; every record parameterizes in that same order.
    #[must_use]
    pub fn compile_insert(&self, query: &QueryBuilder, records: &[Record]) -> String {
        let Some(first) = records.first() else {
            return String::new();
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let rows: Vec<String> = records
            .iter()
            .map(|record| {
                let params: Vec<String> = columns
                    .iter()
                    .map(|col| match record.get(col) {
                        Some(op) => self.parameter(op),
                        None => "?".to_string(),
                    })
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.wrap_table(&query.from),
            self.columnize(&columns),
            rows.join(", ")
        )
    }

    /// Compiles an UPDATE statement over the builder's joins and wheres.
    #[must_use]
    pub fn compile_update(&self, query: &QueryBuilder, record: &Record) -> String {
        let assignments: Vec<String> = record
            .iter()
            .map(|(col, op)| format!("{} = {}", self.wrap(col), self.parameter(op)))
            .collect();
        let mut sql = format!("UPDATE {}", self.wrap_table(&query.from));
        if !query.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_joins(&query.joins));
        }
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));
        if !query.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_wheres(&query.wheres));
        }
        sql
    }

    /// Compiles a DELETE statement over the builder's wheres.
    #[must_use]
    pub fn compile_delete(&self, query: &QueryBuilder) -> String {
        let mut sql = format!("DELETE FROM {}", self.wrap_table(&query.from));
        if !query.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_wheres(&query.wheres));
        }
        sql
    }

    // ---- components ------------------------------------------------------

    fn compile_columns(&self, query: &QueryBuilder) -> String {
        if let Some(aggregate) = &query.aggregate {
            return self.compile_aggregate(query, aggregate);
        }
        let select = if query.distinct { "SELECT DISTINCT" } else { "SELECT" };
        match &query.columns {
            None => format!("{select} *"),
            Some(columns) => {
                let cols: Vec<String> = columns.iter().map(|c| self.wrap_column(c)).collect();
                format!("{select} {}", cols.join(", "))
            }
        }
    }

    fn compile_aggregate(&self, query: &QueryBuilder, aggregate: &Aggregate) -> String {
        let mut column = self.columnize(&aggregate.columns);
        if query.distinct && column != "*" {
            column = format!("DISTINCT {column}");
        }
        format!("SELECT {}({column}) AS aggregate", aggregate.function.as_sql())
    }

    fn compile_joins(&self, joins: &[JoinClause]) -> String {
        let parts: Vec<String> = joins
            .iter()
            .map(|join| {
                let conditions: Vec<String> = join
                    .conditions
                    .iter()
                    .enumerate()
                    .map(|(i, cond)| {
                        let sql = match &cond.constraint {
                            JoinConstraint::On { first, operator, second } => format!(
                                "{} {} {}",
                                self.wrap(first),
                                operator.as_sql(),
                                self.wrap(second)
                            ),
                            JoinConstraint::Where { column, operator, .. } => {
                                format!("{} {} ?", self.wrap(column), operator.as_sql())
                            }
                        };
                        if i == 0 {
                            sql
                        } else {
                            format!("{} {}", cond.connector.as_sql(), sql)
                        }
                    })
                    .collect();
                format!(
                    "{} {} ON {}",
                    join.kind.as_sql(),
                    self.wrap_table(&join.table),
                    conditions.join(" ")
                )
            })
            .collect();
        parts.join(" ")
    }

    fn render_wheres(&self, wheres: &[Where]) -> String {
        wheres
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let sql = self.compile_where_clause(&w.clause);
                if i == 0 {
                    sql
                } else {
                    format!("{} {}", w.connector.as_sql(), sql)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_where_clause(&self, clause: &WhereClause) -> String {
        match clause {
            WhereClause::Basic { column, operator, value } => format!(
                "{} {} {}",
                self.wrap(column),
                operator.as_sql(),
                self.parameter(value)
            ),
            WhereClause::Raw { sql } => sql.clone(),
            WhereClause::Between { column, negated, .. } => {
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {keyword} ? AND ?", self.wrap(column))
            }
            WhereClause::In { column, values, negated } => {
                // An empty list can never match; compile to a constant truth
                // value so the statement stays well-formed.
                if values.is_empty() {
                    return if *negated { "1 = 1" } else { "0 = 1" }.to_string();
                }
                let keyword = if *negated { "NOT IN" } else { "IN" };
                let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
                format!(
                    "{} {keyword} ({})",
                    self.wrap(column),
                    placeholders.join(", ")
                )
            }
            WhereClause::InSub { column, query, negated } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!(
                    "{} {keyword} ({})",
                    self.wrap(column),
                    self.compile_select(query)
                )
            }
            WhereClause::Null { column, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {keyword}", self.wrap(column))
            }
            WhereClause::Nested { query } => {
                format!("({})", self.render_wheres(&query.wheres))
            }
            WhereClause::Sub { column, operator, query } => format!(
                "{} {} ({})",
                self.wrap(column),
                operator.as_sql(),
                self.compile_select(query)
            ),
        }
    }

    fn render_havings(&self, havings: &[Having]) -> String {
        havings
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let sql = match &h.clause {
                    HavingClause::Basic { column, operator, value } => format!(
                        "{} {} {}",
                        self.wrap(column),
                        operator.as_sql(),
                        self.parameter(value)
                    ),
                    HavingClause::Raw { sql } => sql.clone(),
                };
                if i == 0 {
                    sql
                } else {
                    format!("{} {}", h.connector.as_sql(), sql)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_orders(&self, orders: &[OrderClause]) -> String {
        let parts: Vec<String> = orders
            .iter()
            .map(|order| match order {
                OrderClause::Column { column, direction } => {
                    format!("{} {}", self.wrap(column), direction.as_sql())
                }
                OrderClause::Raw { sql } => sql.clone(),
            })
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }

    // ---- identifiers and parameters --------------------------------------

    /// Quotes an identifier. Qualified names (`table.column`) are split and
    /// each segment wrapped; table segments receive the table prefix. An
    /// `... as alias` form wraps each side independently. `*` is never
    /// quoted.
    #[must_use]
    pub fn wrap(&self, identifier: &str) -> String {
        if let Some(pos) = identifier.to_ascii_lowercase().find(" as ") {
            let first = &identifier[..pos];
            let alias = &identifier[pos + 4..];
            return format!("{} AS {}", self.wrap(first), self.wrap_segment(alias));
        }
        let segments: Vec<&str> = identifier.split('.').collect();
        let count = segments.len();
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i < count - 1 {
                    self.wrap_segment(&format!("{}{}", self.table_prefix, segment))
                } else {
                    self.wrap_segment(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quotes a table name, applying the table prefix.
    #[must_use]
    pub fn wrap_table(&self, table: &str) -> String {
        if let Some(pos) = table.to_ascii_lowercase().find(" as ") {
            let first = &table[..pos];
            let alias = &table[pos + 4..];
            return format!("{} AS {}", self.wrap_table(first), self.wrap_segment(alias));
        }
        self.wrap_segment(&format!("{}{}", self.table_prefix, table))
    }

    fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        let quote = self.quote;
        let doubled: String = [quote, quote].iter().collect();
        let escaped = segment.replace(quote, &doubled);
        format!("{quote}{escaped}{quote}")
    }

    fn wrap_column(&self, column: &Column) -> String {
        match column {
            Column::Name(name) => self.wrap(name),
            Column::Raw(expr) => expr.as_sql().to_string(),
        }
    }

    /// Emits a placeholder for a bindable value, or the raw text of an
    /// expression.
    #[must_use]
    pub fn parameter(&self, operand: &Operand) -> String {
        match operand {
            Operand::Value(_) => "?".to_string(),
            Operand::Raw(expr) => expr.as_sql().to_string(),
        }
    }

    /// Wraps and comma-joins a list of plain column names.
    #[must_use]
    pub fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
