use super::{
    DefinedName, DefinedNames, NameScope, ReferenceAdjuster, RewritePolicy, StructuralEdit,
    detect_cycle, same_name, validate_sheet_name,
};
use crate::error::{Error, Result};
use crate::traits::NameResolver;

/// Every defined name of a workbook: the workbook scope plus one
/// container per worksheet, in sheet order.
///
/// Lookups from a sheet try that sheet's names first, then the
/// workbook's. Structural edits go through [`WorkbookNames::apply`] so
/// every formula sees them.
#[derive(Debug, Clone)]
pub struct WorkbookNames {
    workbook: DefinedNames,
    sheets: Vec<DefinedNames>,
    adjuster: ReferenceAdjuster,
}

impl Default for WorkbookNames {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookNames {
    pub fn new() -> Self {
        Self::with_policy(RewritePolicy::default())
    }

    pub fn with_policy(policy: RewritePolicy) -> Self {
        Self {
            workbook: DefinedNames::new(NameScope::Workbook),
            sheets: Vec::new(),
            adjuster: ReferenceAdjuster::new(policy),
        }
    }

    pub fn policy(&self) -> RewritePolicy {
        self.adjuster.policy()
    }

    /// Register a worksheet so it can hold names of its own.
    pub fn add_sheet(&mut self, sheet: &str) -> Result<&mut DefinedNames> {
        validate_sheet_name(sheet)?;
        if self.position(sheet).is_some() {
            return Err(Error::InvalidOperation(format!(
                "worksheet `{sheet}` already exists"
            )));
        }
        self.sheets
            .push(DefinedNames::new(NameScope::Worksheet(sheet.to_string())));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    fn position(&self, sheet: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.scope().sheet().is_some_and(|own| same_name(own, sheet)))
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().filter_map(|s| s.scope().sheet())
    }

    pub fn sheet(&self, sheet: &str) -> Option<&DefinedNames> {
        self.position(sheet).map(|i| &self.sheets[i])
    }

    pub fn sheet_mut(&mut self, sheet: &str) -> Option<&mut DefinedNames> {
        self.position(sheet).map(|i| &mut self.sheets[i])
    }

    fn sheet_or_err(&mut self, sheet: &str) -> Result<&mut DefinedNames> {
        self.sheet_mut(sheet)
            .ok_or_else(|| Error::UnknownSheet(sheet.to_string()))
    }

    pub fn workbook(&self) -> &DefinedNames {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut DefinedNames {
        &mut self.workbook
    }

    /// Every name, workbook scope first.
    pub fn iter(&self) -> impl Iterator<Item = &DefinedName> {
        self.workbook
            .iter()
            .chain(self.sheets.iter().flat_map(DefinedNames::iter))
    }

    pub fn len(&self) -> usize {
        self.workbook.len() + self.sheets.iter().map(DefinedNames::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look `name` up as seen from `from_sheet`: that sheet's names
    /// first, then the workbook's.
    pub fn resolve(&self, name: &str, from_sheet: Option<&str>) -> Option<&DefinedName> {
        from_sheet
            .and_then(|s| self.sheet(s))
            .and_then(|names| names.get(name))
            .or_else(|| self.workbook.get(name))
    }

    /// Rewrite every defined name for `edit` and keep the sheet list in
    /// step with renames and deletions. Returns how many names changed.
    ///
    /// Every rewritten formula is checked before any is stored, so a
    /// failed edit leaves all names and sheets as they were.
    pub fn apply(&mut self, edit: &StructuralEdit) -> Result<usize> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("apply_structural_edit", ?edit).entered();

        edit.validate()?;
        if edit.is_noop() {
            return Ok(0);
        }

        let dropped = match edit {
            StructuralEdit::DeleteSheet { name } => self.position(name),
            _ => None,
        };
        let adjuster = self.adjuster;
        let workbook = self.workbook.rewrites(edit, &adjuster)?;
        let sheets = self
            .sheets
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != dropped)
            .map(|(i, names)| names.rewrites(edit, &adjuster).map(|pending| (i, pending)))
            .collect::<Result<Vec<_>>>()?;

        let mut changed = self.workbook.commit(workbook);
        for (i, pending) in sheets {
            changed += self.sheets[i].commit(pending);
        }

        if let Some(i) = dropped {
            let removed = self.sheets.remove(i);
            #[cfg(feature = "tracing")]
            tracing::debug!(sheet = %removed.scope(), names = removed.len(), "dropped worksheet names");
            drop(removed);
        }
        if let StructuralEdit::RenameSheet { old, new } = edit {
            if let Some(i) = self.position(old) {
                self.sheets[i].set_scope(NameScope::Worksheet(new.clone()));
            }
        }
        Ok(changed)
    }

    pub fn insert_rows(&mut self, sheet: &str, before: u32, count: u32) -> Result<usize> {
        self.apply(&StructuralEdit::InsertRows {
            sheet: sheet.to_string(),
            before,
            count,
        })
    }

    pub fn delete_rows(&mut self, sheet: &str, start: u32, count: u32) -> Result<usize> {
        self.apply(&StructuralEdit::DeleteRows {
            sheet: sheet.to_string(),
            start,
            count,
        })
    }

    pub fn insert_columns(&mut self, sheet: &str, before: u32, count: u32) -> Result<usize> {
        self.apply(&StructuralEdit::InsertColumns {
            sheet: sheet.to_string(),
            before,
            count,
        })
    }

    pub fn delete_columns(&mut self, sheet: &str, start: u32, count: u32) -> Result<usize> {
        self.apply(&StructuralEdit::DeleteColumns {
            sheet: sheet.to_string(),
            start,
            count,
        })
    }

    /// Rename a worksheet. Fails if the new name breaks the sheet naming
    /// rules or another sheet already has it.
    pub fn rename_sheet(&mut self, old: &str, new: &str) -> Result<usize> {
        if self.position(old).is_none() {
            return Err(Error::UnknownSheet(old.to_string()));
        }
        validate_sheet_name(new)?;
        if !same_name(old, new) && self.position(new).is_some() {
            return Err(Error::InvalidOperation(format!(
                "worksheet `{new}` already exists"
            )));
        }
        self.apply(&StructuralEdit::RenameSheet {
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    /// Remove a worksheet together with its names; references to it
    /// elsewhere become `#REF!`.
    pub fn delete_sheet(&mut self, sheet: &str) -> Result<usize> {
        if self.position(sheet).is_none() {
            return Err(Error::UnknownSheet(sheet.to_string()));
        }
        self.apply(&StructuralEdit::DeleteSheet {
            name: sheet.to_string(),
        })
    }

    /// Copy `name` as seen from `from_sheet` into the names of `to_sheet`.
    ///
    /// References to `from_sheet` point at `to_sheet` in the copy; comment
    /// and visibility carry over. Copying onto the same sheet is an
    /// invalid operation, and the copy is subject to the usual collision
    /// and cycle checks.
    pub fn copy_name(&mut self, name: &str, from_sheet: &str, to_sheet: &str) -> Result<&DefinedName> {
        if self.position(from_sheet).is_none() {
            return Err(Error::UnknownSheet(from_sheet.to_string()));
        }
        if self.position(to_sheet).is_none() {
            return Err(Error::UnknownSheet(to_sheet.to_string()));
        }
        let source = self
            .resolve(name, Some(from_sheet))
            .ok_or_else(|| Error::InvalidOperation(format!("no defined name `{name}`")))?;
        let formula = source.retargeted_formula(from_sheet, to_sheet)?;
        let display = source.name().to_string();
        let comment = source.comment().map(str::to_string);
        let visible = source.is_visible();

        let target = self.sheet_or_err(to_sheet)?;
        let copy = target.add(&display, &formula)?;
        copy.set_comment(comment);
        copy.set_visible(visible);
        Ok(&*copy)
    }

    /// Check every name for cycles across scopes.
    pub fn check_cycles(&self) -> Result<()> {
        self.iter().try_for_each(|defined| detect_cycle(defined, self))
    }
}

impl NameResolver for WorkbookNames {
    fn resolve_name(&self, name: &str, from_sheet: Option<&str>) -> Option<&DefinedName> {
        self.resolve(name, from_sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> WorkbookNames {
        let mut book = WorkbookNames::new();
        book.add_sheet("Sheet1").unwrap();
        book.add_sheet("Sheet2").unwrap();
        book
    }

    #[test]
    fn sheet_names_shadow_workbook_names() {
        let mut book = book();
        book.workbook_mut().add("Rate", "0.05").unwrap();
        book.sheet_mut("Sheet1").unwrap().add("Rate", "0.07").unwrap();

        assert_eq!(book.resolve("rate", Some("SHEET1")).unwrap().refers_to(), "0.07");
        assert_eq!(book.resolve("Rate", Some("Sheet2")).unwrap().refers_to(), "0.05");
        assert_eq!(book.resolve("Rate", None).unwrap().refers_to(), "0.05");
        assert!(book.resolve("Missing", Some("Sheet1")).is_none());
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn duplicate_sheets_are_rejected() {
        let mut book = book();
        assert!(matches!(book.add_sheet("sheet1"), Err(Error::InvalidOperation(_))));
        assert_eq!(book.add_sheet("a/b").err(), Some(Error::InvalidName("a/b".into())));
        assert_eq!(book.sheet_names().collect::<Vec<_>>(), ["Sheet1", "Sheet2"]);
    }

    #[test]
    fn edits_reach_every_scope() {
        let mut book = book();
        book.workbook_mut().add("Top", "Sheet1!$B$2").unwrap();
        book.sheet_mut("Sheet1").unwrap().add("Local", "B2").unwrap();
        book.sheet_mut("Sheet2").unwrap().add("Other", "B2").unwrap();

        assert_eq!(book.insert_rows("Sheet1", 1, 2), Ok(2));
        assert_eq!(book.workbook().get("Top").unwrap().refers_to(), "Sheet1!$B$4");
        assert_eq!(
            book.sheet("Sheet1").unwrap().get("Local").unwrap().refers_to(),
            "Sheet1!B4"
        );
        assert_eq!(
            book.sheet("Sheet2").unwrap().get("Other").unwrap().refers_to(),
            "Sheet2!B2"
        );
        assert_eq!(book.insert_rows("Sheet1", 1, 0), Ok(0));
    }

    #[test]
    fn renaming_a_sheet_moves_its_scope() {
        let mut book = book();
        book.sheet_mut("Sheet1").unwrap().add("Local", "A1").unwrap();
        book.workbook_mut().add("Top", "Sheet1!A1+Sheet2!A1").unwrap();

        assert_eq!(book.rename_sheet("Sheet1", "Data Q1").unwrap(), 2);
        assert!(book.sheet("Sheet1").is_none());
        let local = book.resolve("Local", Some("data q1")).unwrap();
        assert_eq!(local.scope(), &NameScope::Worksheet("Data Q1".into()));
        assert_eq!(local.refers_to(), "'Data Q1'!A1");
        assert_eq!(
            book.workbook().get("Top").unwrap().refers_to(),
            "'Data Q1'!A1+Sheet2!A1"
        );

        assert!(matches!(
            book.rename_sheet("Data Q1", "sheet2"),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(
            book.rename_sheet("Nope", "X"),
            Err(Error::UnknownSheet("Nope".into()))
        );
    }

    #[test]
    fn invalid_sheet_renames_leave_the_book_untouched() {
        let mut book = book();
        book.workbook_mut().add("X", "Sheet1!$A$1").unwrap();
        book.sheet_mut("Sheet1").unwrap().add("Local", "B2").unwrap();

        let long = "s".repeat(32);
        for bad in ["", "What?", "'Q1'", long.as_str()] {
            assert_eq!(
                book.rename_sheet("Sheet1", bad),
                Err(Error::InvalidName(bad.to_string()))
            );
        }
        assert_eq!(book.sheet_names().collect::<Vec<_>>(), ["Sheet1", "Sheet2"]);
        assert_eq!(book.workbook().get("X").unwrap().refers_to(), "Sheet1!$A$1");
        assert_eq!(book.resolve("Local", Some("Sheet1")).unwrap().refers_to(), "Sheet1!B2");
    }

    #[test]
    fn zero_positions_are_rejected() {
        let mut book = book();
        book.workbook_mut().add("Block", "Sheet1!$A$1:$A$5").unwrap();

        assert!(matches!(
            book.delete_rows("Sheet1", 0, 2),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            book.insert_columns("Sheet1", 0, 1),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(book.workbook().get("Block").unwrap().refers_to(), "Sheet1!$A$1:$A$5");
        assert_eq!(book.delete_rows("Sheet1", 1, 2), Ok(1));
        assert_eq!(book.workbook().get("Block").unwrap().refers_to(), "Sheet1!$A$1:$A$3");
    }

    #[test]
    fn deleting_a_sheet_drops_its_names_and_breaks_references() {
        let mut book = book();
        book.sheet_mut("Sheet2").unwrap().add("Gone", "A1").unwrap();
        book.workbook_mut().add("Top", "Sheet2!A1:B2,Sheet1!A1").unwrap();

        assert_eq!(book.delete_sheet("Sheet2").unwrap(), 1);
        assert!(book.sheet("Sheet2").is_none());
        assert!(book.resolve("Gone", Some("Sheet2")).is_none());

        let top = book.workbook().get("Top").unwrap();
        assert_eq!(top.refers_to(), "#REF!,Sheet1!A1");
        assert!(!top.is_valid());
    }

    #[test]
    fn copy_name_retargets_the_source_sheet() {
        let mut book = book();
        book.sheet_mut("Sheet1").unwrap().add("Span", "A1:A3").unwrap();
        book.sheet_mut("Sheet1").unwrap().get_mut("Span").unwrap().set_comment(Some("rows".into()));

        let copy = book.copy_name("Span", "Sheet1", "Sheet2").unwrap();
        assert_eq!(copy.refers_to(), "Sheet2!A1:A3");
        assert_eq!(copy.comment(), Some("rows"));
        assert_eq!(copy.scope(), &NameScope::Worksheet("Sheet2".into()));

        assert!(matches!(
            book.copy_name("Span", "Sheet1", "Sheet2"),
            Err(Error::NameCollision(_))
        ));
        assert!(matches!(
            book.copy_name("Span", "Sheet1", "SHEET1"),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(
            book.copy_name("Span", "Sheet1", "Sheet9").err(),
            Some(Error::UnknownSheet("Sheet9".into()))
        );
    }

    #[test]
    fn cycles_across_scopes_are_found() {
        let mut book = book();
        book.workbook_mut().add("Total", "Sheet1!Part*2").unwrap();
        book.sheet_mut("Sheet1").unwrap().add("Part", "Total+1").unwrap();
        assert_eq!(
            book.check_cycles(),
            Err(Error::CircularName("Total".into()))
        );

        book.sheet_mut("Sheet1").unwrap().set_refers_to("Part", "1").unwrap();
        assert_eq!(book.check_cycles(), Ok(()));
    }
}
