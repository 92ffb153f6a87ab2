//! A1-style reference grammar.
//!
//! [`Reference::parse`] classifies the text of a single reference token
//! produced by the tokenizer; `Display` writes it back. The two are
//! inverse up to case and quoting: a reference re-serializes with the
//! same `$` flags it was parsed with, an upper-case column, and the sheet
//! quoted only when [`sheet_needs_quotes`] says so.

use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{self, Display};

/// Rows on a sheet.
pub const MAX_ROWS: u32 = 1_048_576;
/// Columns on a sheet (`XFD`).
pub const MAX_COLS: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    Invalid(String),
}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceError::Invalid(s) => write!(f, "invalid reference: {s}"),
        }
    }
}

impl Error for ReferenceError {}

static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// `1 -> "A"`, `28 -> "AB"`.
pub fn number_to_column(num: u32) -> String {
    if (1..=702).contains(&num) {
        return COLUMN_LOOKUP[(num - 1) as usize].clone();
    }
    let mut n = num;
    let mut out = Vec::with_capacity(3);
    while n > 0 {
        n -= 1;
        out.push((n % 26) as u8 + b'A');
        n /= 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `"AB" -> 28`; `None` for anything outside `A..=XFD`.
pub fn column_to_number(letters: &str) -> Option<u32> {
    let bytes = letters.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 {
        return None;
    }
    let mut col = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u32;
    }
    (col <= MAX_COLS).then_some(col)
}

/// One corner of a reference. Rows and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        CellRef {
            row,
            col,
            row_abs: false,
            col_abs: false,
        }
    }

    pub const fn absolute(row: u32, col: u32) -> Self {
        CellRef {
            row,
            col,
            row_abs: true,
            col_abs: true,
        }
    }

    /// Parse `A1`, `$A1`, `A$1` or `$A$1`.
    pub fn parse(text: &str) -> Option<CellRef> {
        let bytes = text.as_bytes();
        let mut i = 0;
        let col_abs = bytes.first() == Some(&b'$');
        if col_abs {
            i += 1;
        }
        let col_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let col = column_to_number(&text[col_start..i])?;
        let row_abs = bytes.get(i) == Some(&b'$');
        if row_abs {
            i += 1;
        }
        let row = parse_row(&text[i..])?;
        Some(CellRef {
            row,
            col,
            row_abs,
            col_abs,
        })
    }
}

impl Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.col_abs { "$" } else { "" },
            number_to_column(self.col),
            if self.row_abs { "$" } else { "" },
            self.row
        )
    }
}

fn parse_row(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row = digits.parse::<u32>().ok()?;
    (1..=MAX_ROWS).contains(&row).then_some(row)
}

fn strip_dollar(text: &str) -> (bool, &str) {
    match text.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, text),
    }
}

/// One reference as it appears in formula text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Cell {
        sheet: Option<String>,
        cell: CellRef,
    },
    /// Corners are normalized so `from.row <= to.row` and `from.col <= to.col`.
    Range {
        sheet: Option<String>,
        from: CellRef,
        to: CellRef,
    },
    /// Whole rows, `3:5`.
    Rows {
        sheet: Option<String>,
        first: u32,
        last: u32,
        first_abs: bool,
        last_abs: bool,
    },
    /// Whole columns, `B:D`.
    Columns {
        sheet: Option<String>,
        first: u32,
        last: u32,
        first_abs: bool,
        last_abs: bool,
    },
    /// Structured reference; `column` holds the text between the outer
    /// brackets (`Amount`, `#Data`, `[#Headers],[Amount]`).
    Table {
        table: String,
        column: Option<String>,
    },
    /// Another defined name, optionally qualified with a worksheet scope.
    Name { sheet: Option<String>, name: String },
    /// The broken-reference literal `#REF!`, optionally still qualified.
    Error { sheet: Option<String> },
}

impl Reference {
    pub fn parse(text: &str) -> Result<Reference, ReferenceError> {
        let invalid = || ReferenceError::Invalid(text.to_string());
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let upper_tail = trimmed
            .len()
            .checked_sub(5)
            .and_then(|i| trimmed.get(i..))
            .map(|s| s.eq_ignore_ascii_case("#REF!"))
            .unwrap_or(false);
        if upper_tail {
            let prefix = &trimmed[..trimmed.len() - 5];
            if prefix.is_empty() {
                return Ok(Reference::Error { sheet: None });
            }
            let sheet_part = prefix.strip_suffix('!').ok_or_else(invalid)?;
            let sheet = unquote_sheet(sheet_part).ok_or_else(invalid)?;
            return Ok(Reference::Error { sheet: Some(sheet) });
        }

        if let Some(open) = trimmed.find('[') {
            if open == 0 || !trimmed.ends_with(']') {
                return Err(invalid());
            }
            let table = trimmed[..open].to_string();
            let inner = &trimmed[open + 1..trimmed.len() - 1];
            let column = (!inner.is_empty()).then(|| inner.to_string());
            return Ok(Reference::Table { table, column });
        }

        let (sheet, body) = split_sheet(trimmed).ok_or_else(invalid)?;

        if let Some((left, right)) = body.split_once(':') {
            let right = match split_sheet(right) {
                Some((Some(s2), rest)) => match &sheet {
                    Some(s1) if s1.eq_ignore_ascii_case(&s2) => rest,
                    _ => return Err(invalid()),
                },
                Some((None, rest)) => rest,
                None => return Err(invalid()),
            };
            return parse_area(sheet, left, right).ok_or_else(invalid);
        }

        if let Some(cell) = CellRef::parse(body) {
            return Ok(Reference::Cell { sheet, cell });
        }
        if is_name_like(body) && !is_r1c1_reference(body) {
            return Ok(Reference::Name {
                sheet,
                name: body.to_string(),
            });
        }
        Err(invalid())
    }

    /// Build a range, normalizing corners.
    pub fn range(sheet: Option<String>, a: CellRef, b: CellRef) -> Reference {
        let (top, bottom) = if a.row <= b.row { (a, b) } else { (b, a) };
        let (left, right) = if a.col <= b.col { (a, b) } else { (b, a) };
        let from = CellRef {
            row: top.row,
            row_abs: top.row_abs,
            col: left.col,
            col_abs: left.col_abs,
        };
        let to = CellRef {
            row: bottom.row,
            row_abs: bottom.row_abs,
            col: right.col,
            col_abs: right.col_abs,
        };
        Reference::Range { sheet, from, to }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell { sheet, .. }
            | Reference::Range { sheet, .. }
            | Reference::Rows { sheet, .. }
            | Reference::Columns { sheet, .. }
            | Reference::Name { sheet, .. }
            | Reference::Error { sheet } => sheet.as_deref(),
            Reference::Table { .. } => None,
        }
    }

    pub fn set_sheet(&mut self, new_sheet: Option<String>) {
        match self {
            Reference::Cell { sheet, .. }
            | Reference::Range { sheet, .. }
            | Reference::Rows { sheet, .. }
            | Reference::Columns { sheet, .. }
            | Reference::Name { sheet, .. }
            | Reference::Error { sheet } => *sheet = new_sheet,
            Reference::Table { .. } => {}
        }
    }

    /// Grid-addressed references (cells, ranges, bands) that carry no sheet.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Reference::Cell { sheet: None, .. }
                | Reference::Range { sheet: None, .. }
                | Reference::Rows { sheet: None, .. }
                | Reference::Columns { sheet: None, .. }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reference::Error { .. })
    }

    /// Cells, ranges and bands, the references a structural edit can move.
    pub fn is_grid(&self) -> bool {
        matches!(
            self,
            Reference::Cell { .. }
                | Reference::Range { .. }
                | Reference::Rows { .. }
                | Reference::Columns { .. }
        )
    }
}

fn parse_area(sheet: Option<String>, left: &str, right: &str) -> Option<Reference> {
    if let (Some(a), Some(b)) = (CellRef::parse(left), CellRef::parse(right)) {
        return Some(Reference::range(sheet, a, b));
    }

    let (la, lbody) = strip_dollar(left);
    let (ra, rbody) = strip_dollar(right);
    if let (Some(a), Some(b)) = (parse_row(lbody), parse_row(rbody)) {
        let ((first, first_abs), (last, last_abs)) = if a <= b {
            ((a, la), (b, ra))
        } else {
            ((b, ra), (a, la))
        };
        return Some(Reference::Rows {
            sheet,
            first,
            last,
            first_abs,
            last_abs,
        });
    }
    let all_alpha = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic());
    if all_alpha(lbody) && all_alpha(rbody) {
        let a = column_to_number(lbody)?;
        let b = column_to_number(rbody)?;
        let ((first, first_abs), (last, last_abs)) = if a <= b {
            ((a, la), (b, ra))
        } else {
            ((b, ra), (a, la))
        };
        return Some(Reference::Columns {
            sheet,
            first,
            last,
            first_abs,
            last_abs,
        });
    }
    None
}

/// Split `Sheet!rest` or `'Quoted Sheet'!rest`. A body with no `!` has
/// no sheet. `None` signals a malformed qualifier.
fn split_sheet(text: &str) -> Option<(Option<String>, &str)> {
    if text.starts_with('\'') {
        let bytes = text.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                if bytes.get(i + 1) != Some(&b'!') {
                    return None;
                }
                let sheet = unquote_sheet(&text[..=i])?;
                return Some((Some(sheet), &text[i + 2..]));
            }
            i += 1;
        }
        return None;
    }

    match text.find('!') {
        Some(bang) => {
            let sheet = &text[..bang];
            if sheet.is_empty() || sheet.contains(['[', ']', ':']) {
                return None;
            }
            Some((Some(sheet.to_string()), &text[bang + 1..]))
        }
        None => Some((None, text)),
    }
}

/// Strip surrounding quotes and undouble embedded apostrophes.
fn unquote_sheet(text: &str) -> Option<String> {
    if let Some(inner) = text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        if inner.is_empty() {
            return None;
        }
        return Some(inner.replace("''", "'"));
    }
    (!text.is_empty() && !text.contains('\'')).then(|| text.to_string())
}

/// Text shaped like `A1` / `$B$2`.
pub fn is_cell_reference(text: &str) -> bool {
    CellRef::parse(text).is_some()
}

/// Text shaped like an R1C1 reference: `R`, `C`, `R1`, `C3`, `R1C1`, `RC`.
pub fn is_r1c1_reference(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut i = 0;
    let mut seen_part = false;
    for marker in [b'R', b'C'] {
        if bytes.get(i) == Some(&marker) {
            i += 1;
            seen_part = true;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    seen_part && i == bytes.len()
}

fn is_name_like(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '\\' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\\'))
}

/// Whether a sheet name must be wrapped in apostrophes inside a formula.
pub fn sheet_needs_quotes(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    first.is_ascii_digit()
        || name
            .chars()
            .any(|c| !(c.is_alphanumeric() || c == '_' || c == '.'))
        || is_cell_reference(name)
        || is_r1c1_reference(name)
}

/// `Sheet1` -> `Sheet1`, `My Sheet` -> `'My Sheet'`, `Bob's` -> `'Bob''s'`.
pub fn quote_sheet_name(name: &str) -> String {
    if sheet_needs_quotes(name) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

fn write_sheet(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    match sheet {
        Some(s) => write!(f, "{}!", quote_sheet_name(s)),
        None => Ok(()),
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollar = |abs: bool| if abs { "$" } else { "" };
        match self {
            Reference::Cell { sheet, cell } => {
                write_sheet(f, sheet)?;
                write!(f, "{cell}")
            }
            Reference::Range { sheet, from, to } => {
                write_sheet(f, sheet)?;
                write!(f, "{from}:{to}")
            }
            Reference::Rows {
                sheet,
                first,
                last,
                first_abs,
                last_abs,
            } => {
                write_sheet(f, sheet)?;
                write!(
                    f,
                    "{}{first}:{}{last}",
                    dollar(*first_abs),
                    dollar(*last_abs)
                )
            }
            Reference::Columns {
                sheet,
                first,
                last,
                first_abs,
                last_abs,
            } => {
                write_sheet(f, sheet)?;
                write!(
                    f,
                    "{}{}:{}{}",
                    dollar(*first_abs),
                    number_to_column(*first),
                    dollar(*last_abs),
                    number_to_column(*last)
                )
            }
            Reference::Table { table, column } => {
                write!(f, "{table}[{}]", column.as_deref().unwrap_or(""))
            }
            Reference::Name { sheet, name } => {
                write_sheet(f, sheet)?;
                f.write_str(name)
            }
            Reference::Error { sheet } => {
                write_sheet(f, sheet)?;
                f.write_str("#REF!")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn columns_convert_both_ways() {
        assert_eq!(column_to_number("A"), Some(1));
        assert_eq!(column_to_number("az"), Some(52));
        assert_eq!(column_to_number("XFD"), Some(MAX_COLS));
        assert_eq!(column_to_number("XFE"), None);
        assert_eq!(number_to_column(703), "AAA");
        assert_eq!(number_to_column(28), "AB");
    }

    #[test]
    fn parses_every_grid_shape() {
        assert_eq!(
            Reference::parse("Sheet1!$B$2").unwrap(),
            Reference::Cell {
                sheet: sheet("Sheet1"),
                cell: CellRef::absolute(2, 2)
            }
        );
        assert!(matches!(
            Reference::parse("A1:C3").unwrap(),
            Reference::Range { sheet: None, .. }
        ));
        assert!(matches!(
            Reference::parse("Data!$3:$5").unwrap(),
            Reference::Rows { first: 3, last: 5, .. }
        ));
        assert!(matches!(
            Reference::parse("'My Data'!B:D").unwrap(),
            Reference::Columns { first: 2, last: 4, .. }
        ));
    }

    #[test]
    fn reversed_corners_are_normalized() {
        let r = Reference::parse("Sheet1!$C3:A$1").unwrap();
        assert_eq!(r.to_string(), "Sheet1!A$1:$C3");
    }

    #[test]
    fn second_corner_may_repeat_the_sheet() {
        let r = Reference::parse("Sheet1!A1:Sheet1!B2").unwrap();
        assert_eq!(r.to_string(), "Sheet1!A1:B2");
        assert!(Reference::parse("Sheet1!A1:Other!B2").is_err());
    }

    #[test]
    fn names_tables_and_errors() {
        assert_eq!(
            Reference::parse("Rates").unwrap(),
            Reference::Name {
                sheet: None,
                name: "Rates".into()
            }
        );
        assert_eq!(
            Reference::parse("Sales[Amount]").unwrap(),
            Reference::Table {
                table: "Sales".into(),
                column: Some("Amount".into())
            }
        );
        assert_eq!(
            Reference::parse("'Q1 ''24'!#REF!").unwrap(),
            Reference::Error {
                sheet: sheet("Q1 '24")
            }
        );
        assert_eq!(
            Reference::parse("#REF!").unwrap(),
            Reference::Error { sheet: None }
        );
    }

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("2024"), "'2024'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
        assert_eq!(quote_sheet_name("A1"), "'A1'");
        assert_eq!(quote_sheet_name("R1C1"), "'R1C1'");
        assert_eq!(quote_sheet_name("Data.2024"), "Data.2024");
    }

    #[test]
    fn display_round_trips_canonical_text() {
        for text in [
            "Sheet1!$A$1",
            "'My Sheet'!A1:$B$9",
            "Sheet1!$1:$3",
            "Sheet1!A:$C",
            "Sales[[#Data],[Amount]]",
            "Sheet2!Local",
            "Sheet1!#REF!",
        ] {
            assert_eq!(Reference::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn r1c1_lookalikes() {
        for t in ["R", "c", "R1C1", "RC", "R12", "C3"] {
            assert!(is_r1c1_reference(t), "{t}");
        }
        for t in ["RR", "Rate", "CR", "R1C1X"] {
            assert!(!is_r1c1_reference(t), "{t}");
        }
    }

    #[test]
    fn r1c1_text_is_not_a_name() {
        for t in ["Sheet1!R1C1", "R1C1", "'My Sheet'!rc", "Sheet1!R"] {
            assert!(Reference::parse(t).is_err(), "{t}");
        }
        assert_eq!(
            Reference::parse("Sheet1!R1C1X").unwrap(),
            Reference::Name {
                sheet: sheet("Sheet1"),
                name: "R1C1X".into()
            }
        );
    }
}
