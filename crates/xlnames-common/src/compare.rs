//! Cross-type equality and ordering.
//!
//! Comparison operators follow Excel:
//!
//! 1. an error on either side is the result (left side first);
//! 2. a blank takes the zero value of the other side's kind
//!    (`0`, `""` or `FALSE`);
//! 3. values of different kinds order as number < text < boolean;
//! 4. values of the same kind compare by value, text case-insensitively.
//!
//! Sorting uses [`sort_order`], a total order that also places errors and
//! blanks.

use std::cmp::Ordering;

use crate::{ErrorKind, Locale, Value};

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::Text(_) => 1,
        Value::Boolean(_) => 2,
        Value::Error(_) => 3,
        Value::Blank => 4,
    }
}

fn blank_like(other: &Value) -> Value {
    match other {
        Value::Text(_) => Value::Text(String::new()),
        Value::Boolean(_) => Value::Boolean(false),
        _ => Value::Number(0.0),
    }
}

fn compare_same_kind(a: &Value, b: &Value, locale: &Locale) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => locale.compare_text(x, y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Error(x), Value::Error(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Compare two scalars with comparison-operator semantics.
pub fn compare_values(a: &Value, b: &Value, locale: &Locale) -> Result<Ordering, ErrorKind> {
    if let Value::Error(e) = a {
        return Err(*e);
    }
    if let Value::Error(e) = b {
        return Err(*e);
    }

    match (a, b) {
        (Value::Blank, Value::Blank) => Ok(Ordering::Equal),
        (Value::Blank, other) => Ok(compare_same_kind(&blank_like(other), other, locale)),
        (other, Value::Blank) => Ok(compare_same_kind(other, &blank_like(other), locale)),
        _ => Ok(compare_same_kind(a, b, locale)),
    }
}

/// `a = b` under comparison-operator semantics.
pub fn values_equal(a: &Value, b: &Value, locale: &Locale) -> Result<bool, ErrorKind> {
    compare_values(a, b, locale).map(|o| o == Ordering::Equal)
}

/// Total order for sorting: numbers, text, booleans, errors, then blanks.
pub fn sort_order(a: &Value, b: &Value, locale: &Locale) -> Ordering {
    let (ra, rb) = (kind_rank(a), kind_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    compare_same_kind(a, b, locale)
}
