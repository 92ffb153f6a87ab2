use xlnames_common::{ErrorKind, Value};

use super::utils::number_arg;
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("ISERROR", 1, Some(1), |args, _| {
        Value::Boolean(args[0].value().is_error())
    });
    reg.register("ISERR", 1, Some(1), |args, _| {
        Value::Boolean(matches!(args[0].value(), Value::Error(e) if e != ErrorKind::Na))
    });
    reg.register("ISNA", 1, Some(1), |args, _| {
        Value::Boolean(matches!(args[0].value(), Value::Error(ErrorKind::Na)))
    });
    reg.register("ISBLANK", 1, Some(1), |args, _| {
        Value::Boolean(args[0].value().is_blank())
    });
    reg.register("ISNUMBER", 1, Some(1), |args, _| {
        Value::Boolean(matches!(args[0].value(), Value::Number(_)))
    });
    reg.register("ISTEXT", 1, Some(1), |args, _| {
        Value::Boolean(matches!(args[0].value(), Value::Text(_)))
    });
    reg.register("ISNONTEXT", 1, Some(1), |args, _| {
        Value::Boolean(!matches!(args[0].value(), Value::Text(_)))
    });
    reg.register("ISLOGICAL", 1, Some(1), |args, _| {
        Value::Boolean(matches!(args[0].value(), Value::Boolean(_)))
    });
    reg.register("ISEVEN", 1, Some(1), |args, interp| parity(&args[0], interp, 0));
    reg.register("ISODD", 1, Some(1), |args, interp| parity(&args[0], interp, 1));
    reg.register("NA", 0, Some(0), |_, _| Value::Error(ErrorKind::Na));
    reg.register("ERROR.TYPE", 1, Some(1), error_type_fn);
}

fn parity(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>, want: i64) -> Value {
    match number_arg(arg, interp) {
        Ok(n) => Value::Boolean((n.trunc() as i64).rem_euclid(2) == want),
        Err(e) => Value::Error(e),
    }
}

/* ─────────────────────────── ERROR.TYPE() ───────────────────────── */

fn error_type_fn(args: &[ArgumentHandle<'_, '_>], _interp: &Interpreter<'_>) -> Value {
    match args[0].value() {
        Value::Error(e) => Value::Number(f64::from(e.type_code())),
        _ => Value::Error(ErrorKind::Na),
    }
}
