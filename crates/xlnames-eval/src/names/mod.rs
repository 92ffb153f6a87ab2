//! Defined names: validation, reference extraction, structural rewriting
//! and the per-scope containers.
//!
//! A defined name stores its `RefersTo` text. Everything else (the
//! references it mentions, the ranges they resolve to, the parsed AST) is
//! derived from that text and recomputed when it changes. Structural
//! edits rewrite the text in place, splicing only the references that
//! moved.

mod adjust;
mod book;
mod container;
mod defined_name;
mod references;

pub use adjust::{
    InsertBoundaryPolicy, ReferenceAdjuster, RewritePolicy, StructuralEdit, rewrite_formula,
    rewrite_formula_with,
};
pub use book::WorkbookNames;
pub use container::DefinedNames;
pub use defined_name::{DefinedName, DefinedNameId, NameScope};
pub use references::{ReferenceSet, ReferenceSpan, extract_references};

use rustc_hash::FxHashSet;
use xlnames_parse::{Reference, is_cell_reference, is_r1c1_reference};

use crate::error::{Error, Result};
use crate::traits::NameResolver;

/// Longest defined name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Whether `name` may be used as a defined name.
///
/// A name starts with a letter, `_` or `\`, continues with letters,
/// digits, `_`, `.` or `\`, and must not read as a cell reference (`A1`),
/// an R1C1 reference (`R1C1`, `R`, `C`) or a logical literal.
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return false;
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '\\' => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\\')) {
        return false;
    }

    !(is_cell_reference(name)
        || is_r1c1_reference(name)
        || name.eq_ignore_ascii_case("TRUE")
        || name.eq_ignore_ascii_case("FALSE"))
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Longest worksheet name, in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Whether `name` may be used as a worksheet name: 1 to 31 characters,
/// not all whitespace, none of `[ ] : * ? / \`, and no apostrophe at
/// either end.
pub fn is_valid_sheet_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_SHEET_NAME_LEN).contains(&len)
        && !name.trim().is_empty()
        && !name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        && !name.starts_with('\'')
        && !name.ends_with('\'')
}

pub(crate) fn validate_sheet_name(name: &str) -> Result<()> {
    if is_valid_sheet_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Names and sheet names compare without regard to case.
pub(crate) fn fold(text: &str) -> String {
    text.to_lowercase()
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a == b || fold(a) == fold(b)
}

/// Identity of a defined name across scopes: `(scope sheet, name)`, folded.
pub(crate) type NameKey = (Option<String>, String);

/// `Err(CircularName)` when following name references from `start`
/// arrives back at `start`.
pub(crate) fn detect_cycle<'a, R>(start: &'a DefinedName, resolver: &'a R) -> Result<()>
where
    R: NameResolver + ?Sized,
{
    let start_key = start.key();
    let mut seen: FxHashSet<NameKey> = FxHashSet::default();
    let mut pending = vec![start];

    while let Some(current) = pending.pop() {
        let anchor = current.scope().sheet();
        for reference in current.references().iter() {
            let Reference::Name { sheet, name } = reference else {
                continue;
            };
            let from = sheet.as_deref().or(anchor);
            let Some(next) = resolver.resolve_name(name, from) else {
                continue;
            };
            let key = next.key();
            if key == start_key {
                return Err(Error::CircularName(start.name().to_string()));
            }
            if seen.insert(key) {
                pending.push(next);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for name in ["Sales", "_tax", "\\path", "Rate.2024", "Über", "A1B", "TRUEish"] {
            assert!(is_valid_name(name), "{name}");
        }
        assert!(is_valid_name(&"n".repeat(MAX_NAME_LEN)));
    }

    #[test]
    fn rejects_reference_lookalikes() {
        for name in [
            "", "1Foo", ".x", "A1", "$A$1", "xfd1048576", "R1C1", "r", "C", "RC3", "TRUE", "false",
            "has space", "semi;colon", "a-b",
        ] {
            assert!(!is_valid_name(name), "{name:?}");
        }
        assert!(!is_valid_name(&"n".repeat(MAX_NAME_LEN + 1)));
    }

    #[test]
    fn sheet_name_rules() {
        for name in ["Sheet1", "Q1 Data", "Bob's", "2024", "Über-Plan (v2)"] {
            assert!(is_valid_sheet_name(name), "{name}");
        }
        assert!(is_valid_sheet_name(&"s".repeat(MAX_SHEET_NAME_LEN)));
        for name in ["", "   ", "a/b", "a\\b", "[x]", "x:y", "what?", "*", "'lead", "trail'"] {
            assert!(!is_valid_sheet_name(name), "{name:?}");
        }
        assert!(!is_valid_sheet_name(&"s".repeat(MAX_SHEET_NAME_LEN + 1)));
        assert_eq!(
            validate_sheet_name(""),
            Err(Error::InvalidName(String::new()))
        );
    }

    #[test]
    fn validate_reports_the_name() {
        assert_eq!(
            validate_name("1Foo"),
            Err(Error::InvalidName("1Foo".to_string()))
        );
    }
}
