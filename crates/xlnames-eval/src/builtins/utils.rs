use xlnames_common::{
    ErrorKind, Value, coerce_to_bool, coerce_to_int, coerce_to_number, coerce_to_text,
};

use crate::interpreter::{ArgumentHandle, Interpreter};

/// Number coercion of a scalar argument.
pub fn number_arg(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>) -> Result<f64, ErrorKind> {
    coerce_to_number(&arg.value(), interp.locale())
}

/// Integer coercion (truncating toward zero) of a scalar argument.
pub fn int_arg(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>) -> Result<i64, ErrorKind> {
    coerce_to_int(&arg.value(), interp.locale())
}

pub fn text_arg(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>) -> Result<String, ErrorKind> {
    coerce_to_text(&arg.value(), interp.locale())
}

pub fn bool_arg(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>) -> Result<bool, ErrorKind> {
    coerce_to_bool(&arg.value(), interp.locale())
}

/// Optional trailing argument; an omitted one takes `default`.
pub fn opt_number_arg(
    args: &[ArgumentHandle<'_, '_>],
    index: usize,
    default: f64,
    interp: &Interpreter<'_>,
) -> Result<f64, ErrorKind> {
    match args.get(index) {
        Some(arg) if !arg.is_omitted() => number_arg(arg, interp),
        _ => Ok(default),
    }
}

/// Collapse a numeric result into a cell value.
pub fn number_result(r: Result<f64, ErrorKind>) -> Value {
    match r {
        Ok(n) => Value::from_f64(n),
        Err(e) => Value::Error(e),
    }
}

pub fn text_result(r: Result<String, ErrorKind>) -> Value {
    match r {
        Ok(s) => Value::Text(s),
        Err(e) => Value::Error(e),
    }
}

pub fn bool_result(r: Result<bool, ErrorKind>) -> Value {
    match r {
        Ok(b) => Value::Boolean(b),
        Err(e) => Value::Error(e),
    }
}

/// Round half away from zero at `digits` decimal places; negative digits
/// round to the left of the decimal point.
pub fn round_half_away(n: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits.abs());
    if digits >= 0 {
        (n * factor).round() / factor
    } else {
        (n / factor).round() * factor
    }
}
