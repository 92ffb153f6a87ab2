use std::cmp::Ordering;

/// Culture used for text <-> number coercion and text comparison.
///
/// The engine supports exactly one configurable culture at a time.
/// `Locale::invariant()` is the default and is what tests run under:
///
/// - `.` decimal separator, no group separator;
/// - case folding through Unicode lowercase.
///
/// A locale that sets `group_separator` accepts it anywhere in the
/// integer part (`"1,234.5"`) but never emits it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Locale {
    pub decimal_separator: char,
    pub group_separator: Option<char>,
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

impl Locale {
    pub const fn invariant() -> Self {
        Locale {
            decimal_separator: '.',
            group_separator: None,
        }
    }

    pub const fn new(decimal_separator: char, group_separator: Option<char>) -> Self {
        Locale {
            decimal_separator,
            group_separator,
        }
    }

    /// Parse text as a number.
    ///
    /// Accepts an optional sign, digits with at most one decimal separator,
    /// an optional exponent and an optional trailing `%`. Words such as
    /// `inf` or `NaN` are rejected even though `f64::from_str` takes them.
    pub fn parse_number(&self, s: &str) -> Option<f64> {
        let trimmed = s.trim();
        let (body, percent) = match trimmed.strip_suffix('%') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };
        if body.is_empty() {
            return None;
        }

        let mut normalized = String::with_capacity(body.len());
        let mut seen_digit = false;
        let mut seen_decimal = false;
        let mut seen_exp = false;
        let mut prev: Option<char> = None;
        for (i, c) in body.chars().enumerate() {
            match c {
                '0'..='9' => {
                    seen_digit = true;
                    normalized.push(c);
                }
                '+' | '-' if i == 0 || matches!(prev, Some('e' | 'E')) => normalized.push(c),
                'e' | 'E' if seen_digit && !seen_exp => {
                    seen_exp = true;
                    normalized.push('e');
                }
                c if c == self.decimal_separator && !seen_decimal && !seen_exp => {
                    seen_decimal = true;
                    normalized.push('.');
                }
                c if Some(c) == self.group_separator && seen_digit && !seen_decimal && !seen_exp => {}
                _ => return None,
            }
            prev = Some(c);
        }
        if !seen_digit || matches!(prev, Some('e' | 'E' | '+' | '-')) {
            return None;
        }

        let n = normalized.parse::<f64>().ok()?;
        let n = if percent { n / 100.0 } else { n };
        n.is_finite().then_some(n)
    }

    /// Format a number the way a General-formatted cell shows it:
    /// at most 15 significant digits and no trailing `.0`.
    pub fn format_number(&self, n: f64) -> String {
        if n == 0.0 {
            return "0".to_string();
        }
        if n.fract() == 0.0 && n.abs() < 1e15 {
            return format!("{}", n as i64);
        }

        let rounded = format!("{n:.14e}").parse::<f64>().unwrap_or(n);
        let abs = rounded.abs();
        let text = if abs >= 1e15 || abs < 1e-9 {
            let sci = format!("{rounded:E}");
            match sci.split_once('E') {
                Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}E+{exp}"),
                _ => sci,
            }
        } else {
            format!("{rounded}")
        };

        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }

    /// Case folding used for every case-insensitive comparison.
    pub fn fold_case(&self, s: &str) -> String {
        s.to_lowercase()
    }

    pub fn eq_ignore_case(&self, a: &str, b: &str) -> bool {
        a == b || self.fold_case(a) == self.fold_case(b)
    }

    /// Case-insensitive ordering of two strings.
    pub fn compare_text(&self, a: &str, b: &str) -> Ordering {
        self.fold_case(a).cmp(&self.fold_case(b))
    }
}
