use thiserror::Error;
use xlnames_parse::ParserError;

/// Failures of the name-management and evaluation API.
///
/// Evaluation problems inside a formula are values (`Value::Error`), not
/// variants of this type. A structural edit that breaks a reference into
/// `#REF!` is a successful edit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("`{0}` is not a valid name")]
    /// A defined name or worksheet name that breaks the naming rules.
    InvalidName(String),

    #[error("a defined name `{0}` already exists in this scope")]
    NameCollision(String),

    /// A reference without a sheet qualifier inside a defined name.
    #[error("defined name formula `{0}` contains a reference without a sheet")]
    InvalidReference(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("evaluation exceeded the maximum depth of {limit}")]
    Recursion { limit: usize },

    #[error("defined name `{0}` refers to itself")]
    CircularName(String),

    #[error("cannot parse formula `{formula}`: {source}")]
    InvalidFormula {
        formula: String,
        #[source]
        source: ParserError,
    },

    #[error("no worksheet named `{0}`")]
    UnknownSheet(String),
}

impl Error {
    pub(crate) fn invalid_formula(formula: &str, source: impl Into<ParserError>) -> Self {
        Error::InvalidFormula {
            formula: formula.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
