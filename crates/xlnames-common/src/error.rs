//! Excel error codes as they surface from evaluation.
//!
//! Evaluation never raises: a failed operation yields `Value::Error(kind)`
//! and the kind flows through the expression tree like any other value.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All recognised Excel error codes.
///
/// Variants are declared in `ERROR.TYPE` order so the derived `Ord`
/// matches the order Excel uses when comparing error values.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Null,
    Div,
    Value,
    Ref,
    Name,
    Num,
    Na,
    GettingData,
}

/// Every error literal the tokenizer accepts, longest-prefix safe.
pub const ERROR_LITERALS: &[&str] = &[
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
];

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

impl ErrorKind {
    /// The literal Excel spelling (`#DIV/0!`, `#N/A`, ...).
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Null => "#NULL!",
            Self::Div => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::GettingData => "#GETTING_DATA",
        }
    }

    /// Parse an error literal, ignoring ASCII case and surrounding spaces.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#NULL!" => Some(Self::Null),
            "#DIV/0!" => Some(Self::Div),
            "#VALUE!" => Some(Self::Value),
            "#REF!" => Some(Self::Ref),
            "#NAME?" => Some(Self::Name),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::Na),
            "#GETTING_DATA" => Some(Self::GettingData),
            _ => None,
        }
    }

    /// The number `ERROR.TYPE` reports for this kind.
    pub const fn type_code(self) -> u8 {
        match self {
            Self::Null => 1,
            Self::Div => 2,
            Self::Value => 3,
            Self::Ref => 4,
            Self::Name => 5,
            Self::Num => 6,
            Self::Na => 7,
            Self::GettingData => 8,
        }
    }
}

impl std::error::Error for ErrorKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_round_trip() {
        for lit in ERROR_LITERALS {
            let kind = ErrorKind::parse(lit).unwrap();
            assert_eq!(kind.to_string(), *lit);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ErrorKind::parse(" #ref! "), Some(ErrorKind::Ref));
        assert_eq!(ErrorKind::parse("#n/a"), Some(ErrorKind::Na));
        assert_eq!(ErrorKind::parse("#BOGUS!"), None);
    }

    #[test]
    fn ordering_follows_type_codes() {
        assert!(ErrorKind::Null < ErrorKind::Div);
        assert!(ErrorKind::Ref < ErrorKind::Na);
        assert_eq!(ErrorKind::Na.type_code(), 7);
    }
}
