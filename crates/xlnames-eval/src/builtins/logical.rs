use xlnames_common::{ErrorKind, Value};

use super::utils::bool_arg;
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("TRUE", 0, Some(0), |_, _| Value::Boolean(true));
    reg.register("FALSE", 0, Some(0), |_, _| Value::Boolean(false));
    reg.register("IF", 2, Some(3), if_fn);
    reg.register("AND", 1, None, and_fn);
    reg.register("OR", 1, None, or_fn);
    reg.register("XOR", 1, None, xor_fn);
    reg.register("NOT", 1, Some(1), not_fn);
    reg.register("IFERROR", 2, Some(2), iferror_fn);
    reg.register("IFNA", 2, Some(2), ifna_fn);
}

/// Feed every logical value among the arguments to `visit` until it returns
/// `false`. Ranges contribute booleans and numbers and skip text; a direct
/// text argument must spell `TRUE` or `FALSE`.
///
/// Returns whether any logical value was seen.
fn each_logical(
    args: &[ArgumentHandle<'_, '_>],
    interp: &Interpreter<'_>,
    mut visit: impl FnMut(bool) -> bool,
) -> Result<bool, ErrorKind> {
    let mut seen = false;
    for arg in args {
        if arg.is_range_like() {
            for v in arg.values() {
                let b = match v {
                    Value::Boolean(b) => b,
                    Value::Number(n) => n != 0.0,
                    Value::Error(e) => return Err(e),
                    _ => continue,
                };
                seen = true;
                if !visit(b) {
                    return Ok(true);
                }
            }
        } else {
            if arg.value().is_blank() {
                continue;
            }
            let b = bool_arg(arg, interp)?;
            seen = true;
            if !visit(b) {
                return Ok(true);
            }
        }
    }
    Ok(seen)
}

/* ─────────────────────────── IF() ───────────────────────────────── */

fn if_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let cond = match bool_arg(&args[0], interp) {
        Ok(b) => b,
        Err(e) => return Value::Error(e),
    };
    let branch = if cond { args.get(1) } else { args.get(2) };
    match branch {
        Some(arg) if arg.is_omitted() => Value::Number(0.0),
        Some(arg) => arg.value(),
        None => Value::Boolean(false),
    }
}

/* ─────────────────────────── AND() / OR() / XOR() ───────────────── */

fn and_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let mut all = true;
    match each_logical(args, interp, |b| {
        all &= b;
        b
    }) {
        Ok(true) => Value::Boolean(all),
        Ok(false) => Value::Error(ErrorKind::Value),
        Err(e) => Value::Error(e),
    }
}

fn or_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let mut any = false;
    match each_logical(args, interp, |b| {
        any |= b;
        !b
    }) {
        Ok(true) => Value::Boolean(any),
        Ok(false) => Value::Error(ErrorKind::Value),
        Err(e) => Value::Error(e),
    }
}

fn xor_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let mut odd = false;
    match each_logical(args, interp, |b| {
        odd ^= b;
        true
    }) {
        Ok(true) => Value::Boolean(odd),
        Ok(false) => Value::Error(ErrorKind::Value),
        Err(e) => Value::Error(e),
    }
}

/* ─────────────────────────── NOT() ──────────────────────────────── */

fn not_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    match bool_arg(&args[0], interp) {
        Ok(b) => Value::Boolean(!b),
        Err(e) => Value::Error(e),
    }
}

/* ─────────────────────────── IFERROR() / IFNA() ─────────────────── */

fn iferror_fn(args: &[ArgumentHandle<'_, '_>], _interp: &Interpreter<'_>) -> Value {
    match args[0].value() {
        Value::Error(_) => args[1].value(),
        other => other,
    }
}

fn ifna_fn(args: &[ArgumentHandle<'_, '_>], _interp: &Interpreter<'_>) -> Value {
    match args[0].value() {
        Value::Error(ErrorKind::Na) => args[1].value(),
        other => other,
    }
}
