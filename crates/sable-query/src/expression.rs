//! Raw SQL expressions.
//!
//! An [`Expression`] marks a fragment that must reach the compiled SQL
//! verbatim: it bypasses identifier quoting and never produces a parameter
//! binding. It is the designed escape hatch for computed fragments; callers
//! are responsible for trusting its contents.

use std::fmt;

/// A raw SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(String);

impl Expression {
    /// Creates a raw expression.
    ///
    /// **Warning**: the fragment is emitted unescaped. Only use this for SQL
    /// that does not contain untrusted input.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// Returns the raw SQL text.
    #[must_use]
    pub fn as_sql(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`Expression::new`].
#[must_use]
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_passthrough() {
        let e = raw("count(*) + 1");
        assert_eq!(e.as_sql(), "count(*) + 1");
        assert_eq!(e.to_string(), "count(*) + 1");
    }
}
