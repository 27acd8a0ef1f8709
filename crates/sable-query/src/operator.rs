//! SQL comparison operators.

use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// The closed set of comparison operators the builder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal (`=`)
    Eq,
    /// Not equal (`!=`, also accepted as `<>`)
    Ne,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    Lte,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    Gte,
    /// Pattern match (`LIKE`)
    Like,
    /// Negated pattern match (`NOT LIKE`)
    NotLike,
}

impl Operator {
    /// Parses an operator from its SQL spelling.
    ///
    /// Returns [`QueryError::InvalidOperator`] for anything outside the
    /// recognized set, so malformed calls surface before any I/O.
    pub fn parse(op: &str) -> Result<Self, QueryError> {
        match op.trim().to_ascii_lowercase().as_str() {
            "=" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            _ => Err(QueryError::InvalidOperator(op.to_string())),
        }
    }

    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
