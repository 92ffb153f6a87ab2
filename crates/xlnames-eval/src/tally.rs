//! Streaming aggregation for the statistical functions.
//!
//! Direct arguments and range contents are counted differently:
//!
//! | input | [`Tally::add_value`] (direct) | [`Tally::add_range`] (range) |
//! |---|---|---|
//! | number | counted | counted |
//! | boolean | 1 / 0 | skipped |
//! | text | parsed number, else 0 | skipped |
//! | blank | 0 | skipped |
//! | error | recorded | recorded |
//!
//! so `SUM(TRUE, FALSE, 3)` is 4 while the same three cells summed as a
//! range give 3.

use xlnames_common::{ErrorKind, Locale, Value};

use crate::config::SampleVariancePolicy;
use crate::interpreter::ArgumentHandle;

#[derive(Debug, Clone)]
pub struct Tally {
    count: usize,
    sum: f64,
    product: f64,
    mean: f64,
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
    retained: Option<Vec<f64>>,
    error: Option<ErrorKind>,
    locale: Locale,
    sample_policy: SampleVariancePolicy,
}

impl Default for Tally {
    fn default() -> Self {
        Self::new(Locale::invariant(), SampleVariancePolicy::default())
    }
}

impl Tally {
    pub fn new(locale: Locale, sample_policy: SampleVariancePolicy) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            product: 1.0,
            mean: 0.0,
            m2: 0.0,
            min: None,
            max: None,
            retained: None,
            error: None,
            locale,
            sample_policy,
        }
    }

    /// Also keep every counted number, for aggregates that need the whole
    /// list (`MEDIAN`).
    pub fn retaining(mut self) -> Self {
        self.retained = Some(Vec::new());
        self
    }

    fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.product *= x;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
        if let Some(kept) = &mut self.retained {
            kept.push(x);
        }
    }

    /// Add a direct argument.
    pub fn add_value(&mut self, value: &Value) {
        match value {
            Value::Number(n) => self.push(*n),
            Value::Boolean(b) => self.push(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => self.push(self.locale.parse_number(s).unwrap_or(0.0)),
            Value::Blank => self.push(0.0),
            Value::Error(e) => self.record(*e),
        }
    }

    /// Add the contents of a range. Only numbers count.
    pub fn add_range<I: IntoIterator<Item = Value>>(&mut self, values: I) {
        for value in values {
            match value {
                Value::Number(n) => self.push(n),
                Value::Error(e) => self.record(e),
                _ => {}
            }
        }
    }

    /// Add a function argument with the rule its shape calls for.
    pub fn add_argument(&mut self, arg: &ArgumentHandle<'_, '_>) {
        if arg.is_range_like() {
            self.add_range(arg.values());
        } else {
            self.add_value(&arg.value());
        }
    }

    fn record(&mut self, e: ErrorKind) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    /// First error seen, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// The counted numbers in order; empty unless built with
    /// [`Tally::retaining`].
    pub fn retained(&self) -> &[f64] {
        self.retained.as_deref().unwrap_or(&[])
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Product of the counted numbers; `0` when nothing was counted.
    pub fn product(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.product }
    }

    pub fn average(&self) -> Result<f64, ErrorKind> {
        if self.count == 0 {
            return Err(ErrorKind::Div);
        }
        Ok(self.sum / self.count as f64)
    }

    /// Smallest value; `0` when nothing was counted.
    pub fn min(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    /// Largest value; `0` when nothing was counted.
    pub fn max(&self) -> f64 {
        self.max.unwrap_or(0.0)
    }

    pub fn variance_population(&self) -> Result<f64, ErrorKind> {
        if self.count == 0 {
            return Err(ErrorKind::Div);
        }
        Ok(self.m2 / self.count as f64)
    }

    pub fn variance_sample(&self) -> Result<f64, ErrorKind> {
        if self.count <= 1 {
            return match self.sample_policy {
                SampleVariancePolicy::Zero => Ok(0.0),
                SampleVariancePolicy::DivZero => Err(ErrorKind::Div),
            };
        }
        Ok(self.m2 / (self.count - 1) as f64)
    }

    pub fn stddev_population(&self) -> Result<f64, ErrorKind> {
        self.variance_population().map(f64::sqrt)
    }

    pub fn stddev_sample(&self) -> Result<f64, ErrorKind> {
        self.variance_sample().map(f64::sqrt)
    }

    /// The recorded error, or `f` applied to the tally.
    pub fn finish(&self, f: impl FnOnce(&Self) -> Result<f64, ErrorKind>) -> Value {
        if let Some(e) = self.error {
            return Value::Error(e);
        }
        match f(self) {
            Ok(n) => Value::from_f64(n),
            Err(e) => Value::Error(e),
        }
    }
}
