//! SQL values and parameter handling.
//!
//! Every non-raw scalar that enters a query is converted to a [`Value`] and
//! bound positionally through a `?` placeholder, never interpolated into the
//! SQL text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::expression::Expression;

/// A SQL value that can be bound as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Date-time value; the connection adapter decides its wire encoding.
    DateTime(NaiveDateTime),
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Blob(b) => serializer.serialize_bytes(b),
            Self::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        }
    }
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an `i64` where a lossless reading exists.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as an `f64` where a numeric reading exists.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait IntoValue {
    /// Converts the value to a [`Value`].
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for i16 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for i8 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for u16 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for u8 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(String::from(self))
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoValue for &[u8] {
    fn into_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl IntoValue for NaiveDateTime {
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl IntoValue for DateTime<Utc> {
    fn into_value(self) -> Value {
        Value::DateTime(self.naive_utc())
    }
}

impl IntoValue for NaiveDate {
    fn into_value(self) -> Value {
        Value::DateTime(self.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

/// Either a bindable [`Value`] or a raw [`Expression`].
///
/// This is the uniform input type for where/having comparison values and for
/// INSERT/UPDATE value lists. Values bind through a `?` placeholder;
/// expressions are emitted verbatim and never produce a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A parameterized value.
    Value(Value),
    /// A raw SQL fragment.
    Raw(Expression),
}

impl Operand {
    /// Returns `true` when the operand is a bindable NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Self {
        Self::Raw(e)
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Self::Value(v.into_value())
    }
}

impl From<NaiveDateTime> for Operand {
    fn from(v: NaiveDateTime) -> Self {
        Self::Value(v.into_value())
    }
}
