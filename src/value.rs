//! Values produced by expression evaluation
//!
//! Every operator is total: mismatched kinds are coerced rather than
//! rejected. A missing field is the string `"."`, which reads as `0`,
//! `false` or the empty set depending on the consuming operator.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Text of the missing-value sentinel
pub const MISSING: &str = ".";

/// A tagged scalar used throughout evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Set(BTreeSet<String>),
}

/// Numeric view of a value, after promotion
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Real(v) => v,
        }
    }
}

impl Value {
    /// The missing-value sentinel
    pub fn missing() -> Self {
        Value::String(MISSING.to_string())
    }

    /// Whether this is the missing sentinel (or an empty string)
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty() || s == MISSING)
    }

    /// Build a value from raw field text, guessing its kind
    ///
    /// Integers and reals are recognised; anything else stays a string.
    pub fn from_text(text: &str) -> Self {
        if let Ok(v) = text.parse::<i64>() {
            return Value::Integer(v);
        }
        match parse_real(text) {
            Some(v) => Value::Real(v),
            None => Value::String(text.to_string()),
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Integer(v) => Some(Number::Int(*v)),
            Value::Real(v) => Some(Number::Real(*v)),
            Value::String(s) => {
                if let Ok(v) = s.parse::<i64>() {
                    Some(Number::Int(v))
                } else {
                    parse_real(s).map(Number::Real)
                }
            }
            Value::Boolean(_) | Value::Set(_) => None,
        }
    }

    /// Whether the value is numeric, directly or as parseable text
    pub fn is_numeric(&self) -> bool {
        self.number().is_some()
    }

    /// Boolean coercion: non-empty and non-zero is true
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(v) => *v != 0,
            Value::Real(v) => *v != 0.0,
            Value::String(s) => match s.as_str() {
                "" | MISSING => false,
                "false" | "FALSE" | "False" => false,
                _ => true,
            },
            Value::Set(set) => !set.is_empty(),
        }
    }

    /// Integer coercion; unparseable text is 0 and reals truncate toward zero
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Boolean(b) => i64::from(*b),
            Value::Set(set) => set.len() as i64,
            _ => match self.number() {
                Some(Number::Int(v)) => v,
                Some(Number::Real(v)) => v.trunc() as i64,
                None => 0,
            },
        }
    }

    /// Real coercion; unparseable text is 0.0
    pub fn as_real(&self) -> f64 {
        match self {
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Set(set) => set.len() as f64,
            _ => self.number().map_or(0.0, Number::as_f64),
        }
    }

    /// Set coercion: missing is empty, text splits on commas
    pub fn as_set(&self) -> BTreeSet<String> {
        match self {
            Value::Set(set) => set.clone(),
            v if v.is_missing() => BTreeSet::new(),
            Value::String(s) => s.split(',').map(str::to_string).collect(),
            other => BTreeSet::from([other.to_string()]),
        }
    }

    /// Set membership by string equality
    pub fn contains(&self, item: &str) -> bool {
        match self {
            Value::Set(set) => set.contains(item),
            v if v.is_missing() => false,
            Value::String(s) => s.split(',').any(|part| part == item),
            other => other.to_string() == item,
        }
    }

    /// Compare two values
    ///
    /// Numeric when both sides are numeric (Integer pairs compare exactly,
    /// anything else promotes to f64). A missing side facing a numeric side
    /// reads as 0. Otherwise the string forms compare lexicographically.
    pub fn compare(&self, other: &Value) -> Ordering {
        let (left, right) = match (self.number(), other.number()) {
            (Some(l), Some(r)) => (l, r),
            (Some(l), None) if other.is_missing() => (l, Number::Int(0)),
            (None, Some(r)) if self.is_missing() => (Number::Int(0), r),
            _ => return self.to_string().cmp(&other.to_string()),
        };
        match (left, right) {
            (Number::Int(l), Number::Int(r)) => l.cmp(&r),
            (l, r) => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }

    /// Loose equality under the same rules as [`Value::compare`]
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(l), r) => *l == r.as_bool(),
            (l, Value::Boolean(r)) => l.as_bool() == *r,
            (Value::Set(l), r) => *l == r.as_set(),
            (l, Value::Set(r)) => l.as_set() == *r,
            (l, r) => l.compare(r) == Ordering::Equal,
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        self.arithmetic(other, i64::checked_add, |l, r| l + r)
    }

    pub fn sub(&self, other: &Value) -> Value {
        self.arithmetic(other, i64::checked_sub, |l, r| l - r)
    }

    pub fn mul(&self, other: &Value) -> Value {
        self.arithmetic(other, i64::checked_mul, |l, r| l * r)
    }

    /// Division always yields a real
    pub fn div(&self, other: &Value) -> Value {
        Value::Real(self.as_real() / other.as_real())
    }

    /// Arithmetic negation
    pub fn neg(&self) -> Value {
        match self.number() {
            Some(Number::Int(v)) => v
                .checked_neg()
                .map_or(Value::Real(-(v as f64)), Value::Integer),
            Some(Number::Real(v)) => Value::Real(-v),
            None => Value::Integer(-self.as_int()),
        }
    }

    fn arithmetic(
        &self,
        other: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        real_op: fn(f64, f64) -> f64,
    ) -> Value {
        let left = self.number().unwrap_or(Number::Int(self.as_int()));
        let right = other.number().unwrap_or(Number::Int(other.as_int()));
        match (left, right) {
            (Number::Int(l), Number::Int(r)) => int_op(l, r)
                .map_or_else(|| Value::Real(real_op(l as f64, r as f64)), Value::Integer),
            (l, r) => Value::Real(real_op(l.as_f64(), r.as_f64())),
        }
    }
}

/// Parse a real number, rejecting the textual infinities and NaN
fn parse_real(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Set(set) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "{}", items.join(","))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
