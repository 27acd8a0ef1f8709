//! Clause representations accumulated by the query builder.
//!
//! Each clause category is a closed enum; the grammar dispatches on the
//! variants with `match`, which keeps the variant set exhaustive-checkable.

use crate::builder::QueryBuilder;
use crate::expression::Expression;
use crate::operator::Operator;
use crate::value::{IntoValue, Operand, Value};

/// Boolean connector between consecutive clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Connector {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A column specifier in a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// A plain (possibly qualified or aliased) identifier.
    Name(String),
    /// A raw fragment that bypasses quoting.
    Raw(Expression),
}

/// A single where predicate plus its connector.
#[derive(Debug, Clone)]
pub struct Where {
    /// Connector linking this predicate to the previous one.
    pub connector: Connector,
    /// The predicate itself.
    pub clause: WhereClause,
}

/// Where predicate variants.
#[derive(Debug, Clone)]
pub enum WhereClause {
    /// `column op value`
    Basic {
        column: String,
        operator: Operator,
        value: Operand,
    },
    /// Raw SQL fragment.
    Raw { sql: String },
    /// `column [NOT] BETWEEN low AND high`
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// `column [NOT] IN (values...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column [NOT] IN (subquery)`
    InSub {
        column: String,
        query: Box<QueryBuilder>,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    Null { column: String, negated: bool },
    /// Parenthesized group of predicates.
    Nested { query: Box<QueryBuilder> },
    /// `column op (subquery)`
    Sub {
        column: String,
        operator: Operator,
        query: Box<QueryBuilder>,
    },
}

/// A single having predicate plus its connector.
#[derive(Debug, Clone)]
pub struct Having {
    pub connector: Connector,
    pub clause: HavingClause,
}

/// Having predicate variants.
#[derive(Debug, Clone)]
pub enum HavingClause {
    /// `column op value`
    Basic {
        column: String,
        operator: Operator,
        value: Operand,
    },
    /// Raw SQL fragment.
    Raw { sql: String },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Order-by entry variants.
#[derive(Debug, Clone)]
pub enum OrderClause {
    /// `column ASC|DESC`
    Column { column: String, direction: Direction },
    /// Raw SQL fragment.
    Raw { sql: String },
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Returns the SQL keywords.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// One ON-clause constraint of a join.
#[derive(Debug, Clone)]
pub struct JoinCondition {
    pub connector: Connector,
    pub constraint: JoinConstraint,
}

/// Join constraint variants: column-to-column, or column-to-bound-value
/// (the where-style form, which contributes a binding).
#[derive(Debug, Clone)]
pub enum JoinConstraint {
    /// `first op second` where both sides are identifiers.
    On {
        first: String,
        operator: Operator,
        second: String,
    },
    /// `column op ?` with a bound value.
    Where {
        column: String,
        operator: Operator,
        value: Value,
    },
}

/// A complete join clause.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub conditions: Vec<JoinCondition>,
}

/// Fluent builder for compound join constraints, used by
/// [`QueryBuilder::join_on`](crate::QueryBuilder::join_on).
#[derive(Debug, Clone, Default)]
pub struct JoinBuilder {
    pub(crate) conditions: Vec<JoinCondition>,
    pub(crate) bindings: Vec<Value>,
}

impl JoinBuilder {
    /// Adds an `AND first op second` constraint.
    #[must_use]
    pub fn on(mut self, first: &str, operator: Operator, second: &str) -> Self {
        self.conditions.push(JoinCondition {
            connector: Connector::And,
            constraint: JoinConstraint::On {
                first: first.to_string(),
                operator,
                second: second.to_string(),
            },
        });
        self
    }

    /// Adds an `OR first op second` constraint.
    #[must_use]
    pub fn or_on(mut self, first: &str, operator: Operator, second: &str) -> Self {
        self.conditions.push(JoinCondition {
            connector: Connector::Or,
            constraint: JoinConstraint::On {
                first: first.to_string(),
                operator,
                second: second.to_string(),
            },
        });
        self
    }

    /// Adds an `AND column op ?` constraint bound to a value.
    #[must_use]
    pub fn on_value(mut self, column: &str, operator: Operator, value: impl IntoValue) -> Self {
        let value = value.into_value();
        self.bindings.push(value.clone());
        self.conditions.push(JoinCondition {
            connector: Connector::And,
            constraint: JoinConstraint::Where {
                column: column.to_string(),
                operator,
                value,
            },
        });
        self
    }
}

/// Aggregate function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateFunction {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

/// An installed aggregate: function plus target columns. Mutually exclusive
/// with plain column selection while a query executes.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub columns: Vec<String>,
}
