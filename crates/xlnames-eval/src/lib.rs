//! Excel formula evaluation with defined names.
//!
//! The crate has two halves that share one reference model:
//!
//! * [`names`] keeps the defined names of a workbook, validates them,
//!   resolves them to ranges and rewrites their formulas when rows,
//!   columns or sheets are inserted, deleted or renamed.
//! * [`Evaluator`] walks a parsed formula against a host grid
//!   ([`CellProvider`]) and a [`NameResolver`], dispatching function calls
//!   through a [`FunctionRegistry`].

pub mod builtins;
pub mod config;
pub mod criteria;
pub mod error;
pub mod interpreter;
pub mod names;
pub mod registry;
pub mod tally;
pub mod test_workbook;
pub mod traits;
pub mod wildcard;

pub use config::{EvalConfig, SampleVariancePolicy};
pub use criteria::{Comparison, Criteria};
pub use error::{Error, Result};
pub use interpreter::{ArgumentHandle, EvalContext, Evaluator, Interpreter};
pub use names::{
    DefinedName, DefinedNameId, DefinedNames, InsertBoundaryPolicy, NameScope, ReferenceAdjuster,
    ReferenceSet, ReferenceSpan, RewritePolicy, StructuralEdit, WorkbookNames,
    extract_references, is_valid_name, is_valid_sheet_name, rewrite_formula,
};
pub use registry::{FunctionEntry, FunctionRegistry};
pub use tally::Tally;
pub use traits::{CellProvider, NameResolver, SheetGeometry, SheetRange};
pub use wildcard::Wildcard;

pub use xlnames_common::{ErrorKind, Locale, Value};

/// Install a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// warnings from this crate. Does nothing when a subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xlnames_eval=warn".into()),
        )
        .try_init();
}
