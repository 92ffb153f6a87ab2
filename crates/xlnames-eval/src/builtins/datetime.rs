//! Date functions over 1900-system serials.

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use xlnames_common::{
    ErrorKind, MAX_DATE_SERIAL, Value, coerce_to_date, coerce_to_number, datetime_to_serial,
};

use super::utils::{int_arg, number_result, opt_number_arg};
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;

/// Serial of the phantom 1900-02-29.
const PHANTOM_LEAP_DAY: f64 = 60.0;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("DATE", 3, Some(3), date_fn);
    reg.register("YEAR", 1, Some(1), |args, interp| {
        date_part(&args[0], interp, |y, _, _| y)
    });
    reg.register("MONTH", 1, Some(1), |args, interp| {
        date_part(&args[0], interp, |_, m, _| m)
    });
    reg.register("DAY", 1, Some(1), |args, interp| {
        date_part(&args[0], interp, |_, _, d| d)
    });
    reg.register("HOUR", 1, Some(1), |args, interp| {
        time_part(&args[0], interp, |t| t.hour())
    });
    reg.register("MINUTE", 1, Some(1), |args, interp| {
        time_part(&args[0], interp, |t| t.minute())
    });
    reg.register("SECOND", 1, Some(1), |args, interp| {
        time_part(&args[0], interp, |t| t.second())
    });
    reg.register("WEEKDAY", 1, Some(2), weekday_fn);
}

/* ─────────────────────────── DATE() ─────────────────────────────── */

fn date_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let parts = (|| -> Result<(i64, i64, i64), ErrorKind> {
        Ok((
            int_arg(&args[0], interp)?,
            int_arg(&args[1], interp)?,
            int_arg(&args[2], interp)?,
        ))
    })();
    number_result(parts.and_then(|(y, m, d)| date_serial(y, m, d)))
}

/// Serial for a year, month and day where month and day may overflow in
/// either direction. Years below 1900 are offsets from 1900.
fn date_serial(year: i64, month: i64, day: i64) -> Result<f64, ErrorKind> {
    let year = match year {
        0..=1899 => year + 1900,
        1900..=9999 => year,
        _ => return Err(ErrorKind::Num),
    };
    let months = year * 12 + (month - 1);
    let (y, m) = (months.div_euclid(12), months.rem_euclid(12) + 1);
    let y = i32::try_from(y).map_err(|_| ErrorKind::Num)?;
    let m = u32::try_from(m).map_err(|_| ErrorKind::Num)?;

    let first = NaiveDate::from_ymd_opt(y, m, 1).ok_or(ErrorKind::Num)?;
    let date = first
        .checked_add_signed(Duration::try_days(day - 1).ok_or(ErrorKind::Num)?)
        .ok_or(ErrorKind::Num)?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or(ErrorKind::Num)?;
    let serial = datetime_to_serial(&midnight).ok_or(ErrorKind::Num)?;
    if !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return Err(ErrorKind::Num);
    }
    Ok(serial)
}

/* ─────────────────────────── YEAR() / MONTH() / DAY() ───────────── */

fn date_part(
    arg: &ArgumentHandle<'_, '_>,
    interp: &Interpreter<'_>,
    pick: impl Fn(i64, i64, i64) -> i64,
) -> Value {
    let value = arg.value();
    let serial = match coerce_to_number(&value, interp.locale()) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if serial.trunc() == PHANTOM_LEAP_DAY {
        return Value::Number(pick(1900, 2, 29) as f64);
    }
    match coerce_to_date(&value, interp.locale()) {
        Ok(dt) => Value::Number(pick(
            i64::from(dt.year()),
            i64::from(dt.month()),
            i64::from(dt.day()),
        ) as f64),
        Err(e) => Value::Error(e),
    }
}

/* ─────────────────────────── HOUR() / MINUTE() / SECOND() ───────── */

fn time_part(
    arg: &ArgumentHandle<'_, '_>,
    interp: &Interpreter<'_>,
    pick: impl Fn(&chrono::NaiveTime) -> u32,
) -> Value {
    match coerce_to_date(&arg.value(), interp.locale()) {
        Ok(dt) => Value::Number(f64::from(pick(&dt.time()))),
        Err(e) => Value::Error(e),
    }
}

/* ─────────────────────────── WEEKDAY() ──────────────────────────── */

fn weekday_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    let serial = match coerce_to_number(&args[0].value(), interp.locale()) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if !(0.0..MAX_DATE_SERIAL + 1.0).contains(&serial) {
        return Value::Error(ErrorKind::Num);
    }
    let kind = match opt_number_arg(args, 1, 1.0, interp) {
        Ok(k) => k.trunc() as i64,
        Err(e) => return Value::Error(e),
    };
    // Serial 1 is a Sunday in the 1900 system.
    let day = serial.trunc() as i64;
    let n = match kind {
        1 => (day - 1).rem_euclid(7) + 1,
        2 => (day - 2).rem_euclid(7) + 1,
        3 => (day - 2).rem_euclid(7),
        _ => return Value::Error(ErrorKind::Num),
    };
    Value::Number(n as f64)
}
