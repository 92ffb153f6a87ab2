use xlnames_common::{ErrorKind, Value};

use super::math::tally;
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;
use crate::tally::Tally;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("AVERAGE", 1, None, |args, interp| {
        tally(args, interp).finish(Tally::average)
    });
    reg.register("AVERAGEA", 1, None, averagea_fn);
    reg.register("COUNT", 1, None, count_fn);
    reg.register("COUNTA", 1, None, counta_fn);
    reg.register("COUNTBLANK", 1, Some(1), countblank_fn);
    reg.register("MIN", 1, None, |args, interp| {
        tally(args, interp).finish(|t| Ok(t.min()))
    });
    reg.register("MAX", 1, None, |args, interp| {
        tally(args, interp).finish(|t| Ok(t.max()))
    });
    reg.register("MEDIAN", 1, None, median_fn);

    reg.register("VAR.S", 1, None, |args, interp| {
        tally(args, interp).finish(Tally::variance_sample)
    });
    reg.register("VAR.P", 1, None, |args, interp| {
        tally(args, interp).finish(Tally::variance_population)
    });
    reg.register("STDEV.S", 1, None, |args, interp| {
        tally(args, interp).finish(Tally::stddev_sample)
    });
    reg.register("STDEV.P", 1, None, |args, interp| {
        tally(args, interp).finish(Tally::stddev_population)
    });
    reg.alias("VAR", "VAR.S");
    reg.alias("VARP", "VAR.P");
    reg.alias("STDEV", "STDEV.S");
    reg.alias("STDEVP", "STDEV.P");
}

/* ─────────────────────────── AVERAGEA() ─────────────────────────── */

/// Like `AVERAGE`, but text and booleans inside ranges count (as 0 and
/// 0/1).
fn averagea_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let config = interp.config();
    let mut t = Tally::new(config.locale, config.sample_variance);
    for arg in args {
        if !arg.is_range_like() {
            t.add_value(&arg.value());
            continue;
        }
        for v in arg.values() {
            match v {
                Value::Blank => {}
                Value::Text(_) => t.add_value(&Value::Number(0.0)),
                other => t.add_value(&other),
            }
        }
    }
    t.finish(Tally::average)
}

/* ─────────────────────────── COUNT() / COUNTA() ─────────────────── */

fn count_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let locale = interp.locale();
    let mut n = 0usize;
    for arg in args {
        if arg.is_range_like() {
            n += arg.values().filter(|v| matches!(v, Value::Number(_))).count();
            continue;
        }
        let counted = match arg.value() {
            Value::Number(_) | Value::Boolean(_) => true,
            Value::Text(s) => locale.parse_number(&s).is_some(),
            _ => false,
        };
        n += usize::from(counted);
    }
    Value::Number(n as f64)
}

fn counta_fn(args: &[ArgumentHandle<'_, '_>], _interp: &Interpreter<'_>) -> Value {
    let mut n = 0usize;
    for arg in args {
        if arg.is_range_like() {
            n += arg.values().filter(|v| !v.is_blank()).count();
        } else if !arg.is_omitted() {
            n += 1;
        }
    }
    Value::Number(n as f64)
}

/* ─────────────────────────── COUNTBLANK() ───────────────────────── */

fn countblank_fn(args: &[ArgumentHandle<'_, '_>], _interp: &Interpreter<'_>) -> Value {
    let arg = &args[0];
    if !arg.is_reference() {
        return Value::Error(ErrorKind::Value);
    }
    let n = arg.values().filter(Value::is_empty).count();
    Value::Number(n as f64)
}

/* ─────────────────────────── MEDIAN() ───────────────────────────── */

fn median_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let config = interp.config();
    let mut t = Tally::new(config.locale, config.sample_variance).retaining();
    for arg in args {
        t.add_argument(arg);
    }
    t.finish(|t| {
        let mut xs = t.retained().to_vec();
        if xs.is_empty() {
            return Err(ErrorKind::Num);
        }
        xs.sort_by(f64::total_cmp);
        let mid = xs.len() / 2;
        Ok(if xs.len() % 2 == 0 {
            (xs[mid - 1] + xs[mid]) / 2.0
        } else {
            xs[mid]
        })
    })
}
