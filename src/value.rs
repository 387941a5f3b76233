//! The tagged value type carried by attributes and expressions.
//!
//! A [`Datum`] is one of integer, decimal, string, datetime (microseconds
//! since the epoch), binary blob, or an array of those; `Null` marks an
//! unset value. Comparison promotes integers to decimals where the other
//! side is a decimal; everything else compares only against its own type.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::time::Timestamp;

/// A single observed value.
///
/// # Examples
///
/// ```
/// use sysdb::Datum;
///
/// let val = Datum::from("load average");
/// assert!(val.is_string());
/// assert_eq!(val.type_name(), "string");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Datum {
    /// Unset value.
    Null,
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double-precision decimal.
    Decimal(f64),
    /// UTF-8 string.
    String(String),
    /// Point in time, microseconds since the epoch.
    DateTime(Timestamp),
    /// Opaque binary blob.
    Binary(Vec<u8>),
    /// Array of datums; well-formed arrays are homogeneous.
    Array(Vec<Datum>),
}

impl Datum {
    /// Returns true if this datum is unset.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this datum is an integer.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }

    /// Returns true if this datum is a decimal.
    #[must_use]
    pub const fn is_decimal(&self) -> bool {
        matches!(self, Self::Decimal(_))
    }

    /// Returns true if this datum is a string.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns true if this datum is a datetime.
    #[must_use]
    pub const fn is_datetime(&self) -> bool {
        matches!(self, Self::DateTime(_))
    }

    /// Returns true if this datum is a binary blob.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns true if this datum is an array.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the integer value, if any.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a decimal; integers promote.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the string value, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the datetime value, if any.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<Timestamp> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the binary contents, if any.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array elements, if any.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Datum]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
        }
    }

    /// Worst-case estimate of the formatted length in bytes.
    #[must_use]
    pub fn formatted_len(&self) -> usize {
        match self {
            Self::Null => 4,
            Self::Integer(_) => 20,
            Self::Decimal(_) => 24,
            Self::String(s) => s.len() + 2,
            Self::DateTime(_) => 27,
            Self::Binary(b) => 2 * b.len(),
            Self::Array(items) => {
                2 + items.iter().map(|i| i.formatted_len() + 1).sum::<usize>()
            }
        }
    }

    /// Compares two datums, promoting integers to decimals where needed.
    ///
    /// Returns `None` for incomparable types; matchers treat that as a
    /// non-match rather than an error.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;

        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Binary(a), Self::Binary(b)) => Some(a.cmp(b)),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => {
                let a = self.as_decimal()?;
                let b = other.as_decimal()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Sum of two datums.
    ///
    /// Integer pairs stay integers, numeric mixes promote to decimal,
    /// datetime pairs add as durations.
    pub fn add(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a
                .checked_add(*b)
                .map(Self::Integer)
                .ok_or_else(|| overflow("+")),
            (Self::DateTime(a), Self::DateTime(b)) => {
                Ok(Self::DateTime(a.saturating_add(*b)))
            }
            _ => self.decimal_op(other, "+", |a, b| a + b),
        }
    }

    /// Difference of two datums.
    pub fn sub(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a
                .checked_sub(*b)
                .map(Self::Integer)
                .ok_or_else(|| overflow("-")),
            (Self::DateTime(a), Self::DateTime(b)) => {
                Ok(Self::DateTime(a.saturating_sub(*b)))
            }
            _ => self.decimal_op(other, "-", |a, b| a - b),
        }
    }

    /// Product of two datums.
    pub fn mul(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a
                .checked_mul(*b)
                .map(Self::Integer)
                .ok_or_else(|| overflow("*")),
            _ => self.decimal_op(other, "*", |a, b| a * b),
        }
    }

    /// Quotient of two datums. Integer division by zero is an error.
    pub fn div(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::Integer(_), Self::Integer(0)) => Err(StoreError::DivisionByZero),
            (Self::Integer(a), Self::Integer(b)) => Ok(Self::Integer(a / b)),
            _ => self.decimal_op(other, "/", |a, b| a / b),
        }
    }

    /// Remainder of two datums. Integer modulo by zero is an error.
    pub fn modulo(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::Integer(_), Self::Integer(0)) => Err(StoreError::DivisionByZero),
            (Self::Integer(a), Self::Integer(b)) => Ok(Self::Integer(a % b)),
            _ => self.decimal_op(other, "%", |a, b| a % b),
        }
    }

    /// Concatenation; defined for string and binary pairs.
    pub fn concat(&self, other: &Self) -> Result<Self, StoreError> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => {
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(a);
                out.push_str(b);
                Ok(Self::String(out))
            }
            (Self::Binary(a), Self::Binary(b)) => {
                let mut out = Vec::with_capacity(a.len() + b.len());
                out.extend_from_slice(a);
                out.extend_from_slice(b);
                Ok(Self::Binary(out))
            }
            _ => Err(StoreError::TypeMismatch {
                op: "||",
                lhs: self.type_name(),
                rhs: other.type_name(),
            }),
        }
    }

    fn decimal_op(
        &self,
        other: &Self,
        op: &'static str,
        f: impl FnOnce(f64, f64) -> f64,
    ) -> Result<Self, StoreError> {
        match (self.as_decimal(), other.as_decimal()) {
            (Some(a), Some(b)) => Ok(Self::Decimal(f(a, b))),
            _ => Err(StoreError::TypeMismatch {
                op,
                lhs: self.type_name(),
                rhs: other.type_name(),
            }),
        }
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::DateTime(v) => write!(f, "\"{}\"", v.format_datetime()),
            Self::Binary(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn overflow(op: &'static str) -> StoreError {
    StoreError::InvalidArgument(format!("integer overflow in '{op}'"))
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Timestamp> for Datum {
    fn from(v: Timestamp) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(v: Vec<Datum>) -> Self {
        Self::Array(v)
    }
}
