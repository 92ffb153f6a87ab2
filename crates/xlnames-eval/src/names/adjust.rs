//! Reference rewriting for structural edits.
//!
//! Inserting rows or columns moves every reference at or after the
//! insertion point; deleting them moves references below or right of the
//! deleted band back, shrinks ranges that overlap it and turns references
//! that lie entirely inside it into `#REF!`. Absolute and relative
//! references move alike: `$` only matters when a formula is copied.

use xlnames_parse::{CellRef, MAX_COLS, MAX_ROWS, Reference};

use super::{extract_references, validate_sheet_name};
use crate::error::{Error, Result};

/// A change to the shape of a workbook. Rows and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralEdit {
    InsertRows { sheet: String, before: u32, count: u32 },
    DeleteRows { sheet: String, start: u32, count: u32 },
    InsertColumns { sheet: String, before: u32, count: u32 },
    DeleteColumns { sheet: String, start: u32, count: u32 },
    RenameSheet { old: String, new: String },
    DeleteSheet { name: String },
}

impl StructuralEdit {
    /// Edits that cannot move anything: a zero count, or a rename to the
    /// identical name.
    pub fn is_noop(&self) -> bool {
        match self {
            StructuralEdit::InsertRows { count, .. }
            | StructuralEdit::DeleteRows { count, .. }
            | StructuralEdit::InsertColumns { count, .. }
            | StructuralEdit::DeleteColumns { count, .. } => *count == 0,
            StructuralEdit::RenameSheet { old, new } => old == new,
            StructuralEdit::DeleteSheet { .. } => false,
        }
    }

    /// Reject edits that cannot apply to any workbook: a row or column
    /// position of 0 or past the grid, or a rename to an invalid sheet
    /// name.
    pub fn validate(&self) -> Result<()> {
        let (position, limit, what) = match self {
            StructuralEdit::InsertRows { before, .. } => (*before, MAX_ROWS, "row"),
            StructuralEdit::DeleteRows { start, .. } => (*start, MAX_ROWS, "row"),
            StructuralEdit::InsertColumns { before, .. } => (*before, MAX_COLS, "column"),
            StructuralEdit::DeleteColumns { start, .. } => (*start, MAX_COLS, "column"),
            StructuralEdit::RenameSheet { new, .. } => return validate_sheet_name(new),
            StructuralEdit::DeleteSheet { .. } => return Ok(()),
        };
        if position == 0 || position > limit {
            return Err(Error::InvalidOperation(format!(
                "{what} {position} is outside 1..={limit}"
            )));
        }
        Ok(())
    }

    /// The sheet whose grid the edit changes, if any.
    pub fn sheet(&self) -> Option<&str> {
        match self {
            StructuralEdit::InsertRows { sheet, .. }
            | StructuralEdit::DeleteRows { sheet, .. }
            | StructuralEdit::InsertColumns { sheet, .. }
            | StructuralEdit::DeleteColumns { sheet, .. } => Some(sheet),
            StructuralEdit::RenameSheet { .. } | StructuralEdit::DeleteSheet { .. } => None,
        }
    }
}

/// What happens to a multi-cell range whose first row (or column) is
/// exactly the insertion point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertBoundaryPolicy {
    /// The range moves with the inserted lines.
    #[default]
    Shift,
    /// The range keeps its start and grows by the inserted lines.
    Expand,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewritePolicy {
    pub insert_boundary: InsertBoundaryPolicy,
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Row,
    Col,
}

impl Axis {
    fn limit(self) -> u32 {
        match self {
            Axis::Row => MAX_ROWS,
            Axis::Col => MAX_COLS,
        }
    }

    fn get(self, cell: &CellRef) -> u32 {
        match self {
            Axis::Row => cell.row,
            Axis::Col => cell.col,
        }
    }

    fn with(self, cell: CellRef, value: u32) -> CellRef {
        match self {
            Axis::Row => CellRef { row: value, ..cell },
            Axis::Col => CellRef { col: value, ..cell },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shift {
    Insert { before: u32, count: u32 },
    Delete { start: u32, count: u32 },
}

/// Where a 1-D interval `[first, last]` ends up.
enum Moved {
    To(u32, u32),
    Gone,
}

/// Centralized reference adjustment for structural edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceAdjuster {
    policy: RewritePolicy,
}

impl ReferenceAdjuster {
    pub fn new(policy: RewritePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RewritePolicy {
        self.policy
    }

    /// Adjust one reference for `edit`.
    ///
    /// `host` is the sheet unqualified references belong to; with no host
    /// they are left alone. Returns `None` when the reference is
    /// unaffected, and for edits that fail [`StructuralEdit::validate`].
    pub fn adjust_reference(
        &self,
        reference: &Reference,
        host: Option<&str>,
        edit: &StructuralEdit,
    ) -> Option<Reference> {
        if edit.is_noop() || edit.validate().is_err() {
            return None;
        }
        match edit {
            StructuralEdit::RenameSheet { old, new } => {
                let sheet = reference.sheet()?;
                if !super::same_name(sheet, old) {
                    return None;
                }
                let mut renamed = reference.clone();
                renamed.set_sheet(Some(new.clone()));
                Some(renamed)
            }
            StructuralEdit::DeleteSheet { name } => {
                let sheet = reference.sheet()?;
                super::same_name(sheet, name).then_some(Reference::Error { sheet: None })
            }
            StructuralEdit::InsertRows {
                sheet,
                before,
                count,
            } => self.shift(reference, host, sheet, Axis::Row, Shift::Insert {
                before: *before,
                count: *count,
            }),
            StructuralEdit::DeleteRows {
                sheet,
                start,
                count,
            } => self.shift(reference, host, sheet, Axis::Row, Shift::Delete {
                start: *start,
                count: *count,
            }),
            StructuralEdit::InsertColumns {
                sheet,
                before,
                count,
            } => self.shift(reference, host, sheet, Axis::Col, Shift::Insert {
                before: *before,
                count: *count,
            }),
            StructuralEdit::DeleteColumns {
                sheet,
                start,
                count,
            } => self.shift(reference, host, sheet, Axis::Col, Shift::Delete {
                start: *start,
                count: *count,
            }),
        }
    }

    fn shift(
        &self,
        reference: &Reference,
        host: Option<&str>,
        edited: &str,
        axis: Axis,
        shift: Shift,
    ) -> Option<Reference> {
        if !reference.is_grid() {
            return None;
        }
        let on_sheet = reference.sheet().or(host)?;
        if !super::same_name(on_sheet, edited) {
            return None;
        }
        let broken = || Reference::Error {
            sheet: reference.sheet().map(str::to_string),
        };

        let adjusted = match (reference, axis) {
            (Reference::Cell { sheet, cell }, _) => {
                let at = axis.get(cell);
                match self.move_interval(at, at, shift, axis.limit()) {
                    Moved::To(row_or_col, _) => Reference::Cell {
                        sheet: sheet.clone(),
                        cell: axis.with(*cell, row_or_col),
                    },
                    Moved::Gone => broken(),
                }
            }
            (Reference::Range { sheet, from, to }, _) => {
                match self.move_interval(axis.get(from), axis.get(to), shift, axis.limit()) {
                    Moved::To(first, last) => Reference::Range {
                        sheet: sheet.clone(),
                        from: axis.with(*from, first),
                        to: axis.with(*to, last),
                    },
                    Moved::Gone => broken(),
                }
            }
            (
                Reference::Rows {
                    sheet,
                    first,
                    last,
                    first_abs,
                    last_abs,
                },
                Axis::Row,
            ) => match self.move_interval(*first, *last, shift, MAX_ROWS) {
                Moved::To(first, last) => Reference::Rows {
                    sheet: sheet.clone(),
                    first,
                    last,
                    first_abs: *first_abs,
                    last_abs: *last_abs,
                },
                Moved::Gone => broken(),
            },
            (
                Reference::Columns {
                    sheet,
                    first,
                    last,
                    first_abs,
                    last_abs,
                },
                Axis::Col,
            ) => match self.move_interval(*first, *last, shift, MAX_COLS) {
                Moved::To(first, last) => Reference::Columns {
                    sheet: sheet.clone(),
                    first,
                    last,
                    first_abs: *first_abs,
                    last_abs: *last_abs,
                },
                Moved::Gone => broken(),
            },
            // Whole columns span every row, whole rows every column.
            _ => return None,
        };

        (adjusted != *reference).then_some(adjusted)
    }

    fn move_interval(&self, first: u32, last: u32, shift: Shift, limit: u32) -> Moved {
        match shift {
            Shift::Insert { before, count } => {
                let grow = |n: u32| n.checked_add(count).filter(|&m| m <= limit);
                let expand = self.policy.insert_boundary == InsertBoundaryPolicy::Expand;
                let (new_first, new_last) = if first >= before {
                    if first == before && first < last && expand {
                        (Some(first), grow(last))
                    } else {
                        (grow(first), grow(last))
                    }
                } else if last >= before {
                    (Some(first), grow(last))
                } else {
                    (Some(first), Some(last))
                };
                match (new_first, new_last) {
                    (Some(a), Some(b)) => Moved::To(a, b),
                    _ => Moved::Gone,
                }
            }
            Shift::Delete { start, count } => {
                let end = start.saturating_add(count - 1);
                if last < start {
                    Moved::To(first, last)
                } else if first > end {
                    Moved::To(first - count, last - count)
                } else if first >= start && last <= end {
                    Moved::Gone
                } else {
                    let new_first = first.min(start);
                    let new_last = if last > end { last - count } else { start - 1 };
                    Moved::To(new_first, new_last)
                }
            }
        }
    }

    /// Rewrite `formula` for `edit`, with unqualified references on
    /// `host`. `None` when no reference moved.
    pub fn rewrite(
        &self,
        formula: &str,
        host: Option<&str>,
        edit: &StructuralEdit,
    ) -> Result<Option<String>> {
        edit.validate()?;
        if edit.is_noop() {
            return Ok(None);
        }
        let set = extract_references(formula)?;
        Ok(set.rewrite(|r| self.adjust_reference(r, host, edit)))
    }
}

/// Rewrite a cell formula living on `host_sheet` for `edit`, with the
/// default [`RewritePolicy`]. Unchanged formulas come back as they were.
pub fn rewrite_formula(text: &str, host_sheet: &str, edit: &StructuralEdit) -> Result<String> {
    rewrite_formula_with(text, host_sheet, edit, RewritePolicy::default())
}

pub fn rewrite_formula_with(
    text: &str,
    host_sheet: &str,
    edit: &StructuralEdit,
    policy: RewritePolicy,
) -> Result<String> {
    let rewritten = ReferenceAdjuster::new(policy).rewrite(text, Some(host_sheet), edit)?;
    Ok(rewritten.unwrap_or_else(|| text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_rows(before: u32, count: u32) -> StructuralEdit {
        StructuralEdit::InsertRows {
            sheet: "Sheet1".into(),
            before,
            count,
        }
    }

    fn delete_rows(start: u32, count: u32) -> StructuralEdit {
        StructuralEdit::DeleteRows {
            sheet: "Sheet1".into(),
            start,
            count,
        }
    }

    fn rw(text: &str, edit: &StructuralEdit) -> String {
        rewrite_formula(text, "Sheet1", edit).unwrap()
    }

    #[test]
    fn insert_moves_references_at_or_after_the_point() {
        let edit = insert_rows(3, 2);
        assert_eq!(rw("=A2+A3+$B$10", &edit), "=A2+A5+$B$12");
        assert_eq!(rw("=SUM(A1:A3)", &edit), "=SUM(A1:A5)");
        assert_eq!(rw("=SUM(A3:A4)", &edit), "=SUM(A5:A6)");
        assert_eq!(rw("=SUM(2:4)+SUM(C:C)", &edit), "=SUM(2:6)+SUM(C:C)");
    }

    #[test]
    fn expand_policy_grows_ranges_starting_at_the_point() {
        let expand = RewritePolicy {
            insert_boundary: InsertBoundaryPolicy::Expand,
        };
        let edit = insert_rows(3, 2);
        let out = rewrite_formula_with("=SUM(A3:A4)+A3", "Sheet1", &edit, expand).unwrap();
        assert_eq!(out, "=SUM(A3:A6)+A5");
    }

    #[test]
    fn other_sheets_are_untouched() {
        let edit = insert_rows(1, 5);
        assert_eq!(rw("=Sheet2!A1+A1", &edit), "=Sheet2!A1+A6");
        assert_eq!(
            rewrite_formula("=A1", "Sheet2", &edit).unwrap(),
            "=A1"
        );
    }

    #[test]
    fn delete_shrinks_moves_and_breaks() {
        let edit = delete_rows(3, 2);
        assert_eq!(rw("=A1+A5", &edit), "=A1+A3");
        assert_eq!(rw("=A3", &edit), "=#REF!");
        assert_eq!(rw("=Sheet1!A4", &edit), "=Sheet1!#REF!");
        assert_eq!(rw("=SUM(A1:A10)", &edit), "=SUM(A1:A8)");
        assert_eq!(rw("=SUM(A2:A3)", &edit), "=SUM(A2:A2)");
        assert_eq!(rw("=SUM(A4:A6)", &edit), "=SUM(A3:A4)");
        assert_eq!(rw("=SUM(A3:B4)", &edit), "=SUM(#REF!)");
        assert_eq!(rw("=SUM(3:4)", &edit), "=SUM(#REF!)");
    }

    #[test]
    fn columns_follow_the_same_rules() {
        let insert = StructuralEdit::InsertColumns {
            sheet: "Sheet1".into(),
            before: 2,
            count: 1,
        };
        assert_eq!(rw("=A1+B1+SUM(B:C)+SUM(1:1)", &insert), "=A1+C1+SUM(C:D)+SUM(1:1)");

        let delete = StructuralEdit::DeleteColumns {
            sheet: "Sheet1".into(),
            start: 1,
            count: 1,
        };
        assert_eq!(rw("=A1+C1", &delete), "=#REF!+B1");
    }

    #[test]
    fn pushing_past_the_grid_breaks_the_reference() {
        let edit = insert_rows(1, 1);
        let last = format!("=A{MAX_ROWS}");
        assert_eq!(rw(&last, &edit), "=#REF!");
    }

    #[test]
    fn renaming_requotes() {
        let edit = StructuralEdit::RenameSheet {
            old: "Sheet1".into(),
            new: "My Data".into(),
        };
        assert_eq!(
            rw("=sheet1!A1+Sheet2!B1+A1+Sheet1!Rate", &edit),
            "='My Data'!A1+Sheet2!B1+A1+'My Data'!Rate"
        );
    }

    #[test]
    fn deleting_a_sheet_breaks_its_references() {
        let edit = StructuralEdit::DeleteSheet {
            name: "Sheet2".into(),
        };
        assert_eq!(rw("=Sheet2!A1:B2+Sheet1!A1", &edit), "=#REF!+Sheet1!A1");
    }

    #[test]
    fn positions_start_at_one() {
        let edit = delete_rows(0, 2);
        assert!(matches!(
            rewrite_formula("=SUM(A1:A5)", "Sheet1", &edit),
            Err(Error::InvalidOperation(_))
        ));
        assert!(insert_rows(0, 1).validate().is_err());
        assert!(insert_rows(MAX_ROWS + 1, 1).validate().is_err());
        assert!(insert_rows(MAX_ROWS, 1).validate().is_ok());

        let a1 = Reference::parse("A1").unwrap();
        let adjuster = ReferenceAdjuster::default();
        assert_eq!(adjuster.adjust_reference(&a1, Some("Sheet1"), &edit), None);
    }

    #[test]
    fn renaming_to_an_invalid_sheet_name_fails() {
        for new in ["", "a/b", "'quoted'"] {
            let edit = StructuralEdit::RenameSheet {
                old: "Sheet1".into(),
                new: new.into(),
            };
            assert_eq!(
                rewrite_formula("=Sheet1!A1", "Sheet1", &edit),
                Err(Error::InvalidName(new.into()))
            );
        }
    }

    #[test]
    fn noop_edits_leave_text_alone() {
        assert!(insert_rows(1, 0).is_noop());
        assert_eq!(rw("=a1 + A2", &insert_rows(1, 0)), "=a1 + A2");
        let same = StructuralEdit::RenameSheet {
            old: "Sheet1".into(),
            new: "Sheet1".into(),
        };
        assert_eq!(rw("=sheet1!a1", &same), "=sheet1!a1");
    }
}
