//! Local mutations applied to a single key.

use crate::error::{CoreError, Result};
use crate::number::Number;
use serde::{Deserialize, Serialize};

/// A change requested by a client against one key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Overwrite the value.
    Set(Number),
    /// Add to the current value. An absent key takes the delta.
    Add(Number),
    /// Multiply the current value. An absent key becomes zero.
    Multiply(Number),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Set(_) => "set",
            Mutation::Add(_) => "add",
            Mutation::Multiply(_) => "multiply",
        }
    }

    pub fn operand(&self) -> Number {
        match *self {
            Mutation::Set(v) | Mutation::Add(v) | Mutation::Multiply(v) => v,
        }
    }

    /// Compute the value `key` holds after this mutation.
    ///
    /// A non-finite operand is rejected for every mutation, including a
    /// `Set` or an `Add` on an absent key that would store it unchanged.
    pub fn apply(&self, key: &str, current: Option<Number>) -> Result<Number> {
        let operand = self.operand();
        if !operand.is_finite() {
            return Err(CoreError::NonFinite {
                key: key.to_string(),
                op: self.name(),
            });
        }

        let result = match (*self, current) {
            (Mutation::Set(v), _) => return Ok(v),
            (Mutation::Add(d), None) => return Ok(d),
            (Mutation::Multiply(_), None) => return Ok(Number::ZERO),
            (Mutation::Add(d), Some(c)) => c.checked_add(d),
            (Mutation::Multiply(f), Some(c)) => c.checked_mul(f),
        };

        result.ok_or_else(|| {
            let key = key.to_string();
            let op = self.name();
            if operand.is_float() || current.is_some_and(|c| c.is_float()) {
                CoreError::NonFinite { key, op }
            } else {
                CoreError::Overflow { key, op }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_multiply_on_existing_value() {
        let current = Some(Number::Int(5));
        assert_eq!(Mutation::Add(2.into()).apply("x", current).unwrap(), Number::Int(7));
        assert_eq!(Mutation::Multiply(3.into()).apply("x", current).unwrap(), Number::Int(15));
        assert_eq!(Mutation::Set(9.into()).apply("x", current).unwrap(), Number::Int(9));
    }

    #[test]
    fn test_absent_key_defaults() {
        assert_eq!(Mutation::Add(100.into()).apply("x", None).unwrap(), Number::Int(100));
        assert_eq!(Mutation::Multiply(50.into()).apply("x", None).unwrap(), Number::ZERO);
    }

    #[test]
    fn test_zero_is_a_present_value() {
        let current = Some(Number::Int(0));
        assert_eq!(Mutation::Add(4.into()).apply("x", current).unwrap(), Number::Int(4));
        assert_eq!(Mutation::Multiply(4.into()).apply("x", current).unwrap(), Number::Int(0));
    }

    #[test]
    fn test_overflow_reports_key_and_op() {
        let err = Mutation::Multiply(2.into())
            .apply("balance", Some(Number::Int(i64::MAX)))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::Overflow {
                key: "balance".to_string(),
                op: "multiply"
            }
        );

        let err = Mutation::Add(Number::Float(f64::MAX))
            .apply("balance", Some(Number::Float(f64::MAX)))
            .unwrap_err();
        assert!(matches!(err, CoreError::NonFinite { op: "add", .. }));
    }

    #[test]
    fn test_non_finite_operand_is_rejected() {
        for mutation in [
            Mutation::Set(Number::Float(f64::NAN)),
            Mutation::Add(Number::Float(f64::INFINITY)),
            Mutation::Multiply(Number::Float(f64::NEG_INFINITY)),
        ] {
            for current in [None, Some(Number::Int(3))] {
                assert_eq!(
                    mutation.apply("x", current),
                    Err(CoreError::NonFinite {
                        key: "x".to_string(),
                        op: mutation.name()
                    })
                );
            }
        }
    }
}
