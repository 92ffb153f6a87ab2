//! Seams between the engine and the host document.
//!
//! The engine never owns cells. A host exposes its grid through
//! [`SheetGeometry`] (shape only, enough to resolve names into ranges) and
//! [`CellProvider`] (values and formulas, for evaluation). Defined names
//! are looked up through [`NameResolver`].

use std::fmt::{self, Display};

use xlnames_common::{ErrorKind, Value};
use xlnames_parse::{ASTNode, CellRef, Reference};

use crate::names::DefinedName;

/* ───────────────────────────── SheetRange ───────────────────────────── */

/// A resolved rectangle on one worksheet. Coordinates are 1-based and
/// inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRange {
    pub sheet: String,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl SheetRange {
    pub fn new(
        sheet: impl Into<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }

    pub fn cell(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self::new(sheet, row, col, row, col)
    }

    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn len(&self) -> u64 {
        u64::from(self.rows()) * u64::from(self.cols())
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }

    /// Cell coordinates in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start_row..=self.end_row)
            .flat_map(move |r| (self.start_col..=self.end_col).map(move |c| (r, c)))
    }

    /// Resolve a cell, range or band. Unqualified references bind to
    /// `default_sheet`; bands are clipped to the sheet's used extent and
    /// give `Ok(None)` on an empty sheet.
    ///
    /// A sheet the geometry does not know gives `#REF!`, as do table, name
    /// and `#REF!` references.
    pub fn from_reference<G: SheetGeometry + ?Sized>(
        reference: &Reference,
        default_sheet: &str,
        geometry: &G,
    ) -> Result<Option<SheetRange>, ErrorKind> {
        let sheet = reference.sheet().unwrap_or(default_sheet);
        let Some((rows, cols)) = geometry.dimensions(sheet) else {
            return Err(ErrorKind::Ref);
        };
        let area = match reference {
            Reference::Cell { cell, .. } => Some(Self::cell(sheet, cell.row, cell.col)),
            Reference::Range { from, to, .. } => {
                Some(Self::new(sheet, from.row, from.col, to.row, to.col))
            }
            Reference::Rows { first, last, .. } => {
                (cols > 0).then(|| Self::new(sheet, *first, 1, *last, cols))
            }
            Reference::Columns { first, last, .. } => {
                (rows > 0).then(|| Self::new(sheet, 1, *first, rows, *last))
            }
            Reference::Table { .. } | Reference::Name { .. } | Reference::Error { .. } => {
                return Err(ErrorKind::Ref);
            }
        };
        Ok(area)
    }

    /// The absolute, sheet-qualified reference to this rectangle.
    pub fn to_reference(&self) -> Reference {
        let from = CellRef::absolute(self.start_row, self.start_col);
        if self.is_single_cell() {
            Reference::Cell {
                sheet: Some(self.sheet.clone()),
                cell: from,
            }
        } else {
            Reference::Range {
                sheet: Some(self.sheet.clone()),
                from,
                to: CellRef::absolute(self.end_row, self.end_col),
            }
        }
    }
}

impl Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_reference())
    }
}

/* ───────────────────────────── host traits ───────────────────────────── */

pub trait SheetGeometry {
    /// Used extent of a worksheet as `(rows, cols)`, or `None` when no such
    /// sheet exists. Whole-row and whole-column references are clipped to
    /// this extent.
    fn dimensions(&self, sheet: &str) -> Option<(u32, u32)>;

    /// Area of a table, or of one of its columns.
    fn table_area(&self, _table: &str, _column: Option<&str>) -> Option<SheetRange> {
        None
    }
}

pub trait CellProvider: SheetGeometry {
    fn value(&self, sheet: &str, row: u32, col: u32) -> Value;

    /// Parsed formula of a cell. Cells with a formula are evaluated on
    /// demand instead of reading [`CellProvider::value`].
    fn formula(&self, _sheet: &str, _row: u32, _col: u32) -> Option<&ASTNode> {
        None
    }
}

pub trait NameResolver {
    /// Look a name up as seen from `from_sheet`: that sheet's own names
    /// first, then the workbook's.
    fn resolve_name(&self, name: &str, from_sheet: Option<&str>) -> Option<&DefinedName>;
}

impl<T: SheetGeometry + ?Sized> SheetGeometry for &T {
    fn dimensions(&self, sheet: &str) -> Option<(u32, u32)> {
        (**self).dimensions(sheet)
    }

    fn table_area(&self, table: &str, column: Option<&str>) -> Option<SheetRange> {
        (**self).table_area(table, column)
    }
}
