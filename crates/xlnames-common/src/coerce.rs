//! Conversions between value kinds.
//!
//! Every conversion takes the locale explicitly so that evaluation is
//! deterministic regardless of the host environment. An `Error` operand
//! is returned unchanged as the `Err` side; callers propagate it.

use chrono::NaiveDateTime;

use crate::{ErrorKind, Locale, Value, serial_to_datetime};

/// Number coercion used by arithmetic operators and numeric functions.
///
/// | input | result |
/// |---|---|
/// | `Number(n)` | `n` |
/// | `Boolean` | `1` / `0` |
/// | `Blank`, `""` | `0` |
/// | numeric text | parsed through `locale` |
/// | other text | `#VALUE!` |
/// | `Error(e)` | `e` |
pub fn coerce_to_number(value: &Value, locale: &Locale) -> Result<f64, ErrorKind> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Blank => Ok(0.0),
        Value::Text(s) if s.is_empty() => Ok(0.0),
        Value::Text(s) => locale.parse_number(s).ok_or(ErrorKind::Value),
        Value::Error(e) => Err(*e),
    }
}

pub fn coerce_to_bool(value: &Value, locale: &Locale) -> Result<bool, ErrorKind> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Blank => Ok(false),
        Value::Text(s) => {
            if locale.eq_ignore_case(s, "TRUE") {
                Ok(true)
            } else if locale.eq_ignore_case(s, "FALSE") {
                Ok(false)
            } else {
                Err(ErrorKind::Value)
            }
        }
        Value::Error(e) => Err(*e),
    }
}

pub fn coerce_to_text(value: &Value, locale: &Locale) -> Result<String, ErrorKind> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Number(n) => Ok(locale.format_number(*n)),
        Value::Boolean(true) => Ok("TRUE".to_string()),
        Value::Boolean(false) => Ok("FALSE".to_string()),
        Value::Blank => Ok(String::new()),
        Value::Error(e) => Err(*e),
    }
}

/// Interpret a value as a serial date.
///
/// The integer part is the day count from the 1900 epoch; the fractional
/// part is the time of day. Serials outside the calendar give `#NUM!`.
pub fn coerce_to_date(value: &Value, locale: &Locale) -> Result<NaiveDateTime, ErrorKind> {
    let serial = coerce_to_number(value, locale)?;
    serial_to_datetime(serial).ok_or(ErrorKind::Num)
}

/// Truncate towards zero after number coercion, as integer-taking
/// functions (`LEFT`, `MID`, `DATE`, ...) do.
pub fn coerce_to_int(value: &Value, locale: &Locale) -> Result<i64, ErrorKind> {
    let n = coerce_to_number(value, locale)?;
    if !n.is_finite() || n.abs() > i64::MAX as f64 {
        return Err(ErrorKind::Num);
    }
    Ok(n.trunc() as i64)
}
