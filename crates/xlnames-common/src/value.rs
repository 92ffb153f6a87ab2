use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

use crate::{ErrorKind, Locale};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Excel date-serial utilities ───────────────────
Excel's 1900 date system:
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom: Excel believes 1900 was a leap year)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day.
The fractional part of a serial is the time of day.
------------------------------------------------------------------- */

/// Largest serial Excel accepts (9999-12-31).
pub const MAX_DATE_SERIAL: f64 = 2_958_465.0;

fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 31)
}

fn phantom_cutover() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 3, 1)
}

/// Convert a calendar date-time into a serial number.
///
/// Returns `None` only if chrono cannot build the fixed epoch constants.
pub fn datetime_to_serial(dt: &NaiveDateTime) -> Option<f64> {
    let epoch = excel_epoch()?;
    let days = (dt.date() - epoch).num_days();
    let serial_days = if dt.date() >= phantom_cutover()? {
        days + 1
    } else {
        days
    };
    let secs = dt.time().num_seconds_from_midnight() as f64;
    Some(serial_days as f64 + secs / 86_400.0)
}

/// Convert a serial number into a calendar date-time.
///
/// Serial 60 (the phantom 1900-02-29) maps onto 1900-02-28. Negative or
/// out-of-range serials yield `None`.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_DATE_SERIAL + 1.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let mut secs = (serial.fract() * 86_400.0).round() as i64;
    let mut day_carry = 0;
    if secs >= 86_400 {
        secs -= 86_400;
        day_carry = 1;
    }

    let date = if days == 60 {
        NaiveDate::from_ymd_opt(1900, 2, 28)?
    } else {
        let offset = if days < 60 { days } else { days - 1 };
        excel_epoch()? + ChronoDur::days(offset + day_carry)
    };
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}

/// A scalar produced by evaluating a formula.
///
/// Dates are not a separate variant: they are `Number` serials that
/// specific functions interpret through [`serial_to_datetime`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorKind),
    #[default]
    Blank,
}

impl Value {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    /// Blank, or text of length zero.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Blank => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Error(_) => "error",
            Value::Blank => "blank",
        }
    }

    /// Build a number, turning NaN and infinities into `#NUM!`.
    pub fn from_f64(n: f64) -> Self {
        if n.is_finite() {
            Value::Number(n)
        } else {
            Value::Error(ErrorKind::Num)
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(e: ErrorKind) -> Self {
        Value::Error(e)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&Locale::invariant().format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::Error(e) => write!(f, "{e}"),
            Value::Blank => Ok(()),
        }
    }
}
