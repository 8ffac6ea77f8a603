//! Dynamically-typed runtime values.
//!
//! Spells are dynamically typed at the expression level: bindings, step
//! outputs, and ledger payloads all flow through [`Value`]. Arithmetic and
//! comparison semantics over this type live in `eval::expression`; this
//! module only owns the shape and its JSON correspondence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::primitives::{Address, AssetId, Amount, BasisPoints};

/// A dynamically-typed value flowing through expressions, bindings, and the
/// ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision token amount (serializes as a decimal string).
    Amount(Amount),
    String(String),
    Address(Address),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Amount(_) => "amount",
            Value::String(_) => "string",
            Value::Address(_) => "address",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Truthiness per §4.D: `null`, `false`, `0`, `0.0`, empty string, empty
    /// array/object are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Amount(a) => !a.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Address(_) => true,
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Amount(a) => write!(f, "{a}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Address(a) => write!(f, "{a}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Amount> for Value {
    fn from(a: Amount) -> Self {
        Value::Amount(a)
    }
}

impl From<BasisPoints> for Value {
    fn from(bp: BasisPoints) -> Self {
        Value::Float(bp.to_fraction())
    }
}

impl From<AssetId> for Value {
    fn from(a: AssetId) -> Self {
        Value::String(a.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::String("0".into()).is_truthy());
    }

    #[test]
    fn type_name_reports_tag() {
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
    }
}
