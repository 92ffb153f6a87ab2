use xlnames_common::{ErrorKind, Value, coerce_to_text};

use super::utils::{int_arg, text_arg, text_result};
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;

/// Longest text a cell can hold.
const MAX_TEXT_LEN: usize = 32_767;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("CONCATENATE", 1, None, concatenate_fn);
    reg.register("CONCAT", 1, None, concat_fn);
    reg.register("LEN", 1, Some(1), |args, interp| match text_arg(&args[0], interp) {
        Ok(s) => Value::Number(s.chars().count() as f64),
        Err(e) => Value::Error(e),
    });
    reg.register("UPPER", 1, Some(1), |args, interp| {
        text_result(text_arg(&args[0], interp).map(|s| s.to_uppercase()))
    });
    reg.register("LOWER", 1, Some(1), |args, interp| {
        text_result(text_arg(&args[0], interp).map(|s| s.to_lowercase()))
    });
    reg.register("TRIM", 1, Some(1), |args, interp| {
        text_result(text_arg(&args[0], interp).map(|s| trim_spaces(&s)))
    });
    reg.register("LEFT", 1, Some(2), |args, interp| {
        text_result(take(args, interp, |s, n| s.chars().take(n).collect()))
    });
    reg.register("RIGHT", 1, Some(2), |args, interp| {
        text_result(take(args, interp, |s, n| {
            let skip = s.chars().count().saturating_sub(n);
            s.chars().skip(skip).collect()
        }))
    });
    reg.register("MID", 3, Some(3), mid_fn);
    reg.register("EXACT", 2, Some(2), exact_fn);
    reg.register("REPT", 2, Some(2), rept_fn);
}

fn checked(s: String) -> Result<String, ErrorKind> {
    if s.chars().count() > MAX_TEXT_LEN {
        Err(ErrorKind::Value)
    } else {
        Ok(s)
    }
}

/// Removes leading and trailing spaces and collapses inner runs to one.
fn trim_spaces(s: &str) -> String {
    s.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shared shape of `LEFT` and `RIGHT`: text plus an optional count that
/// defaults to 1 and must not be negative.
fn take(
    args: &[ArgumentHandle<'_, '_>],
    interp: &Interpreter<'_>,
    f: impl Fn(&str, usize) -> String,
) -> Result<String, ErrorKind> {
    let s = text_arg(&args[0], interp)?;
    let n = match args.get(1) {
        Some(arg) if !arg.is_omitted() => int_arg(arg, interp)?,
        _ => 1,
    };
    let n = usize::try_from(n).map_err(|_| ErrorKind::Value)?;
    Ok(f(&s, n))
}

/* ─────────────────────────── CONCATENATE() / CONCAT() ───────────── */

fn concatenate_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let mut out = String::new();
    for arg in args {
        match text_arg(arg, interp) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Error(e),
        }
    }
    text_result(checked(out))
}

fn concat_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let mut out = String::new();
    for arg in args {
        for v in arg.values() {
            match coerce_to_text(&v, interp.locale()) {
                Ok(s) => out.push_str(&s),
                Err(e) => return Value::Error(e),
            }
        }
    }
    text_result(checked(out))
}

/* ─────────────────────────── MID() ──────────────────────────────── */

fn mid_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let run = || -> Result<String, ErrorKind> {
        let s = text_arg(&args[0], interp)?;
        let start = int_arg(&args[1], interp)?;
        let len = int_arg(&args[2], interp)?;
        if start < 1 || len < 0 {
            return Err(ErrorKind::Value);
        }
        let skip = usize::try_from(start - 1).map_err(|_| ErrorKind::Value)?;
        let len = usize::try_from(len).map_err(|_| ErrorKind::Value)?;
        Ok(s.chars().skip(skip).take(len).collect())
    };
    text_result(run())
}

/* ─────────────────────────── EXACT() ────────────────────────────── */

fn exact_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    match (text_arg(&args[0], interp), text_arg(&args[1], interp)) {
        (Ok(a), Ok(b)) => Value::Boolean(a == b),
        (Err(e), _) | (_, Err(e)) => Value::Error(e),
    }
}

/* ─────────────────────────── REPT() ─────────────────────────────── */

fn rept_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let s = match text_arg(&args[0], interp) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let times = match int_arg(&args[1], interp) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let Ok(times) = usize::try_from(times) else {
        return Value::Error(ErrorKind::Value);
    };
    if s.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
        return Value::Error(ErrorKind::Value);
    }
    Value::Text(s.repeat(times))
}
