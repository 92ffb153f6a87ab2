use xlnames_common::{ErrorKind, Value};

use super::utils::{number_arg, number_result, round_half_away};
use crate::interpreter::{ArgumentHandle, Interpreter, power};
use crate::registry::FunctionRegistry;
use crate::tally::Tally;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("SUM", 1, None, sum_fn);
    reg.register("PRODUCT", 1, None, product_fn);
    reg.register("ABS", 1, Some(1), |args, interp| unary(&args[0], interp, f64::abs));
    reg.register("INT", 1, Some(1), |args, interp| unary(&args[0], interp, f64::floor));
    reg.register("SIGN", 1, Some(1), |args, interp| {
        unary(&args[0], interp, |n| if n == 0.0 { 0.0 } else { n.signum() })
    });
    reg.register("SQRT", 1, Some(1), sqrt_fn);
    reg.register("ROUND", 2, Some(2), round_fn);
    reg.register("MOD", 2, Some(2), mod_fn);
    reg.register("POWER", 2, Some(2), power_fn);
}

pub(crate) fn tally(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Tally {
    let config = interp.config();
    let mut t = Tally::new(config.locale, config.sample_variance);
    for arg in args {
        t.add_argument(arg);
    }
    t
}

fn unary(arg: &ArgumentHandle<'_, '_>, interp: &Interpreter<'_>, f: impl Fn(f64) -> f64) -> Value {
    number_result(number_arg(arg, interp).map(f))
}

/* ─────────────────────────── SUM() / PRODUCT() ──────────────────── */

fn sum_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    tally(args, interp).finish(|t| Ok(t.sum()))
}

fn product_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    tally(args, interp).finish(|t| Ok(t.product()))
}

/* ─────────────────────────── SQRT() ─────────────────────────────── */

fn sqrt_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    number_result(number_arg(&args[0], interp).and_then(|n| {
        if n < 0.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(n.sqrt())
        }
    }))
}

/* ─────────────────────────── ROUND() ────────────────────────────── */

fn round_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let n = match number_arg(&args[0], interp) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let digits = match number_arg(&args[1], interp) {
        Ok(d) => d.trunc().clamp(-308.0, 308.0) as i32,
        Err(e) => return Value::Error(e),
    };
    Value::from_f64(round_half_away(n, digits))
}

/* ─────────────────────────── MOD() ──────────────────────────────── */

fn mod_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let n = match number_arg(&args[0], interp) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let d = match number_arg(&args[1], interp) {
        Ok(d) => d,
        Err(e) => return Value::Error(e),
    };
    if d == 0.0 {
        return Value::Error(ErrorKind::Div);
    }
    // Result takes the divisor's sign.
    Value::from_f64(n - d * (n / d).floor())
}

/* ─────────────────────────── POWER() ────────────────────────────── */

fn power_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    match (number_arg(&args[0], interp), number_arg(&args[1], interp)) {
        (Ok(base), Ok(exp)) => power(base, exp),
        (Err(e), _) | (_, Err(e)) => Value::Error(e),
    }
}
