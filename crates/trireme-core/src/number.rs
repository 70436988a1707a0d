//! Numeric values held by a replica's store.
//!
//! Stored values only need to compose under addition and multiplication.
//! Integers use checked arithmetic and stay integral; any float operand
//! promotes the result to a float. Overflow and non-finite results are
//! reported instead of wrapping or propagating `inf`/`NaN`.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored number.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// The value multiplication produces for a key that was never written.
    pub const ZERO: Number = Number::Int(0);

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Integers are always finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            Number::Int(_) => true,
            Number::Float(v) => v.is_finite(),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Add two numbers, returning `None` on overflow or a non-finite result.
    pub fn checked_add(self, rhs: Number) -> Option<Number> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a.checked_add(b).map(Number::Int),
            (a, b) => finite(a.as_f64() + b.as_f64()),
        }
    }

    /// Multiply two numbers, returning `None` on overflow or a non-finite result.
    pub fn checked_mul(self, rhs: Number) -> Option<Number> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a.checked_mul(b).map(Number::Int),
            (a, b) => finite(a.as_f64() * b.as_f64()),
        }
    }

    /// Convert a JSON value, rejecting anything that is not a finite number.
    pub fn from_json(key: &str, value: &serde_json::Value) -> Result<Number> {
        let non_numeric = || CoreError::NonNumeric {
            key: key.to_string(),
            found: value.to_string(),
        };

        let number = match value {
            serde_json::Value::Number(n) => n,
            _ => return Err(non_numeric()),
        };

        if let Some(v) = number.as_i64() {
            return Ok(Number::Int(v));
        }
        number.as_f64().and_then(finite).ok_or_else(non_numeric)
    }
}

fn finite(v: f64) -> Option<Number> {
    v.is_finite().then_some(Number::Float(v))
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Int(v as i64)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float(v)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}
