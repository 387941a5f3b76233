//! The expression engine.
//!
//! An expression is a small tagged tree — a field reference, a literal
//! datum, or a binary arithmetic node — evaluated against a store object to
//! produce a datum. Evaluation never mutates the object.

use crate::error::StoreError;
use crate::object::Field;
use crate::store::objects::ObjectRef;
use crate::value::Datum;

/// Binary operators over datums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Modulo.
    Mod,
    /// String or binary concatenation.
    Concat,
}

impl BinaryOp {
    /// The operator's symbol, as used in diagnostics.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Concat => "||",
        }
    }
}

/// An expression over a store object.
///
/// # Examples
///
/// ```
/// use sysdb::{Expr, Field, Datum, Timestamp};
///
/// // last_update + 10us
/// let expr = Expr::field(Field::LastUpdate)
///     .add(Expr::constant(Datum::DateTime(Timestamp::from_micros(10))));
/// ```
#[derive(Debug, Clone)]
pub enum Expr {
    /// References a uniform field on the evaluated object.
    Field(Field),
    /// A literal datum.
    Const(Datum),
    /// A binary arithmetic node.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// An expression referencing a field of the evaluated object.
    #[must_use]
    pub const fn field(field: Field) -> Self {
        Self::Field(field)
    }

    /// A constant-valued expression.
    #[must_use]
    pub fn constant(value: impl Into<Datum>) -> Self {
        Self::Const(value.into())
    }

    /// A binary arithmetic expression.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `self + rhs`.
    #[must_use]
    pub fn add(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    /// `self - rhs`.
    #[must_use]
    pub fn sub(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    /// `self * rhs`.
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    /// `self / rhs`.
    #[must_use]
    pub fn div(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    /// `self % rhs`.
    #[must_use]
    pub fn modulo(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Mod, self, rhs)
    }

    /// `self || rhs` (concatenation).
    #[must_use]
    pub fn concat(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Concat, self, rhs)
    }

    /// Evaluates the expression against a store object.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when an arithmetic node combines operands
    /// of incompatible types or divides by zero.
    pub fn eval(&self, obj: &ObjectRef<'_>) -> Result<Datum, StoreError> {
        match self {
            Self::Field(field) => Ok(obj.field(*field)),
            Self::Const(value) => Ok(value.clone()),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(obj)?;
                let rhs = rhs.eval(obj)?;
                match op {
                    BinaryOp::Add => lhs.add(&rhs),
                    BinaryOp::Sub => lhs.sub(&rhs),
                    BinaryOp::Mul => lhs.mul(&rhs),
                    BinaryOp::Div => lhs.div(&rhs),
                    BinaryOp::Mod => lhs.modulo(&rhs),
                    BinaryOp::Concat => lhs.concat(&rhs),
                }
            }
        }
    }
}
