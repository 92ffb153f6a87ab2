//! Criteria for `COUNTIF`, `SUMIF` and friends.
//!
//! A criterion is a value. Text may start with a comparison operator, in
//! which case the rest is the operand:
//!
//! ```text
//! 5        ">5"     "<>apple"     "a*c"     ""     "<>"     TRUE
//! ```
//!
//! Numeric operands compare numerically, and text candidates that parse
//! as numbers take part. Text operands compare case-insensitively; `=` and
//! `<>` use wildcard matching. `""` matches empty cells and `"<>"`
//! non-empty ones. A blank candidate never satisfies a numeric or wildcard
//! criterion.

use std::cmp::Ordering;

use xlnames_common::{ErrorKind, Locale, Value};

use crate::wildcard::Wildcard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// Prefixes in the order they are tried; two-character operators first.
    const PREFIXES: [(&'static str, Comparison); 6] = [
        ("<>", Comparison::Ne),
        (">=", Comparison::Ge),
        ("<=", Comparison::Le),
        ("=", Comparison::Eq),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
    ];

    fn split(text: &str) -> (Comparison, &str) {
        Self::PREFIXES
            .iter()
            .find_map(|(prefix, op)| text.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Comparison::Eq, text))
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Comparison::Eq => ord.is_eq(),
            Comparison::Ne => ord.is_ne(),
            Comparison::Lt => ord.is_lt(),
            Comparison::Le => ord.is_le(),
            Comparison::Gt => ord.is_gt(),
            Comparison::Ge => ord.is_ge(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Empty,
    Number(f64),
    Boolean(bool),
    Error(ErrorKind),
    Text { text: String, pattern: Wildcard },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    op: Comparison,
    operand: Operand,
    locale: Locale,
}

impl Criteria {
    pub fn new(criterion: &Value, locale: &Locale) -> Self {
        let (op, operand) = match criterion {
            Value::Number(n) => (Comparison::Eq, Operand::Number(*n)),
            Value::Boolean(b) => (Comparison::Eq, Operand::Boolean(*b)),
            Value::Error(e) => (Comparison::Eq, Operand::Error(*e)),
            Value::Blank => (Comparison::Eq, Operand::Empty),
            Value::Text(s) => {
                let (op, rest) = Comparison::split(s);
                (op, Self::operand(rest, locale))
            }
        };
        Self {
            op,
            operand,
            locale: *locale,
        }
    }

    fn operand(rest: &str, locale: &Locale) -> Operand {
        if rest.is_empty() {
            return Operand::Empty;
        }
        if let Some(n) = locale.parse_number(rest) {
            return Operand::Number(n);
        }
        if rest.eq_ignore_ascii_case("TRUE") {
            return Operand::Boolean(true);
        }
        if rest.eq_ignore_ascii_case("FALSE") {
            return Operand::Boolean(false);
        }
        if let Some(e) = ErrorKind::parse(rest) {
            return Operand::Error(e);
        }
        Operand::Text {
            text: rest.to_string(),
            pattern: Wildcard::new(rest),
        }
    }

    pub fn comparison(&self) -> Comparison {
        self.op
    }

    pub fn matches(&self, candidate: &Value) -> bool {
        let ne = self.op == Comparison::Ne;
        match &self.operand {
            Operand::Empty => match self.op {
                Comparison::Eq => candidate.is_empty(),
                Comparison::Ne => !candidate.is_empty(),
                _ => false,
            },
            Operand::Number(x) => {
                let n = match candidate {
                    Value::Number(n) => Some(*n),
                    Value::Text(t) => self.locale.parse_number(t),
                    Value::Blank => return false,
                    _ => None,
                };
                match n {
                    Some(n) => n.partial_cmp(x).is_some_and(|ord| self.op.holds(ord)),
                    None => ne,
                }
            }
            Operand::Boolean(b) => match candidate {
                Value::Boolean(v) => self.op.holds(v.cmp(b)),
                _ => ne,
            },
            Operand::Error(e) => match candidate {
                Value::Error(v) => self.op.holds(v.cmp(e)),
                _ => ne,
            },
            Operand::Text { text, pattern } => match candidate {
                Value::Text(t) => match self.op {
                    Comparison::Eq => pattern.is_match(t),
                    Comparison::Ne => !pattern.is_match(t),
                    op => op.holds(self.locale.compare_text(t, text)),
                },
                Value::Blank if pattern.has_wildcards() => false,
                _ => ne,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INV: Locale = Locale::invariant();

    fn crit(v: Value) -> Criteria {
        Criteria::new(&v, &INV)
    }

    fn count(c: &Criteria, values: &[Value]) -> usize {
        values.iter().filter(|v| c.matches(v)).count()
    }

    #[test]
    fn numeric_operators() {
        let values = [1.0, 5.0, 6.0, 10.0].map(Value::Number);
        assert_eq!(count(&crit(Value::text(">5")), &values), 2);
        assert_eq!(count(&crit(Value::text(">=5")), &values), 3);
        assert_eq!(count(&crit(Value::text("<5")), &values), 1);
        assert_eq!(count(&crit(Value::text("<=5")), &values), 2);
        assert_eq!(count(&crit(Value::text("=5")), &values), 1);
        assert_eq!(count(&crit(Value::text("<>5")), &values), 3);
        assert_eq!(count(&crit(Value::Number(10.0)), &values), 1);
    }

    #[test]
    fn numeric_text_candidates_take_part() {
        let c = crit(Value::text(">5"));
        assert!(c.matches(&Value::text("7")));
        assert!(!c.matches(&Value::text("seven")));
        assert!(!c.matches(&Value::Blank));
    }

    #[test]
    fn wildcard_text() {
        let c = crit(Value::text("a*c"));
        assert!(c.matches(&Value::text("abc")));
        assert!(c.matches(&Value::text("ABBBC")));
        assert!(!c.matches(&Value::text("abd")));
        assert!(!c.matches(&Value::Blank));
        assert!(!c.matches(&Value::Number(1.0)));

        let ne = crit(Value::text("<>a*"));
        assert!(ne.matches(&Value::text("banana")));
        assert!(!ne.matches(&Value::text("apple")));
        assert!(ne.matches(&Value::Number(3.0)));
        assert!(!ne.matches(&Value::Blank));
    }

    #[test]
    fn text_ordering_is_case_insensitive() {
        let c = crit(Value::text(">b"));
        assert!(c.matches(&Value::text("C")));
        assert!(!c.matches(&Value::text("A")));
        assert!(!c.matches(&Value::Number(100.0)));
    }

    #[test]
    fn empty_and_non_empty() {
        let values = [Value::Blank, Value::text(""), Value::text("x"), Value::Number(0.0)];
        assert_eq!(count(&crit(Value::text("")), &values), 2);
        assert_eq!(count(&crit(Value::text("=")), &values), 2);
        assert_eq!(count(&crit(Value::text("<>")), &values), 2);
        assert_eq!(count(&crit(Value::Blank), &values), 2);
    }

    #[test]
    fn booleans_and_errors_match_by_kind() {
        let t = crit(Value::Boolean(true));
        assert!(t.matches(&Value::Boolean(true)));
        assert!(!t.matches(&Value::Number(1.0)));
        assert!(crit(Value::text("true")).matches(&Value::Boolean(true)));

        let na = crit(Value::text("#N/A"));
        assert!(na.matches(&Value::Error(ErrorKind::Na)));
        assert!(!na.matches(&Value::Error(ErrorKind::Div)));
        assert!(crit(Value::text("<>#N/A")).matches(&Value::Number(1.0)));
    }

    #[test]
    fn prefix_order() {
        assert_eq!(crit(Value::text("<>1")).comparison(), Comparison::Ne);
        assert_eq!(crit(Value::text(">=1")).comparison(), Comparison::Ge);
        assert_eq!(crit(Value::text("<=1")).comparison(), Comparison::Le);
        assert_eq!(crit(Value::text("==1")).comparison(), Comparison::Eq);
        assert_eq!(crit(Value::text("1")).comparison(), Comparison::Eq);
    }
}
