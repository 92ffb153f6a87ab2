use std::fmt::{self, Display};

use once_cell::unsync::OnceCell;
use xlnames_parse::{ASTNode, ParserError, Reference, parse, quote_sheet_name};

use super::{NameKey, ReferenceSet, extract_references, fold, same_name};
use crate::error::{Error, Result};
use crate::traits::{NameResolver, SheetGeometry, SheetRange};

/// Where a defined name is visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Every sheet of the workbook.
    Workbook,
    /// One worksheet; shadows a workbook name of the same spelling there.
    Worksheet(String),
}

impl NameScope {
    pub fn sheet(&self) -> Option<&str> {
        match self {
            NameScope::Workbook => None,
            NameScope::Worksheet(sheet) => Some(sheet),
        }
    }

    pub fn is_workbook(&self) -> bool {
        matches!(self, NameScope::Workbook)
    }
}

impl Display for NameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameScope::Workbook => f.write_str("Workbook"),
            NameScope::Worksheet(sheet) => f.write_str(&quote_sheet_name(sheet)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinedNameId(pub u32);

/// A named formula.
///
/// The `RefersTo` text is the source of truth; the references, ranges and
/// AST are derived from it. The AST is parsed on first use and dropped
/// whenever the text changes.
#[derive(Debug, Clone)]
pub struct DefinedName {
    id: DefinedNameId,
    name: String,
    scope: NameScope,
    comment: Option<String>,
    visible: bool,
    references: ReferenceSet,
    ast: OnceCell<Result<ASTNode, ParserError>>,
}

impl DefinedName {
    pub(crate) fn new(
        id: DefinedNameId,
        name: &str,
        scope: NameScope,
        references: ReferenceSet,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            scope,
            comment: None,
            visible: true,
            references,
            ast: OnceCell::new(),
        }
    }

    pub fn id(&self) -> DefinedNameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_display_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn scope(&self) -> &NameScope {
        &self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: NameScope) {
        self.scope = scope;
    }

    pub(crate) fn key(&self) -> NameKey {
        (self.scope.sheet().map(fold), fold(&self.name))
    }

    pub fn refers_to(&self) -> &str {
        self.references.formula()
    }

    /// Replace the formula after strict validation.
    ///
    /// Local references are qualified with the scope sheet for worksheet
    /// names and rejected for workbook names; a formula that names this
    /// very name is circular. Cycles through other names are checked by
    /// the containers.
    pub fn set_refers_to(&mut self, text: &str) -> Result<()> {
        let references = strict_references(&self.scope, text)?;
        if self.names_itself(&references) {
            return Err(Error::CircularName(self.name.clone()));
        }
        self.replace_references(references);
        Ok(())
    }

    pub(crate) fn replace_references(&mut self, references: ReferenceSet) {
        self.references = references;
        self.ast = OnceCell::new();
    }

    fn names_itself(&self, references: &ReferenceSet) -> bool {
        references.iter().any(|r| match r {
            Reference::Name { sheet, name } => {
                same_name(name, &self.name)
                    && match (sheet.as_deref(), self.scope.sheet()) {
                        (None, _) => true,
                        (Some(q), Some(own)) => same_name(q, own),
                        (Some(_), None) => false,
                    }
            }
            _ => false,
        })
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// `false` once a structural edit has broken the formula.
    pub fn is_valid(&self) -> bool {
        self.references.is_valid()
    }

    /// The rectangles the name covers, with local references bound to the
    /// scope sheet.
    pub fn ranges<G: SheetGeometry + ?Sized>(
        &self,
        geometry: &G,
        names: Option<&dyn NameResolver>,
    ) -> Vec<SheetRange> {
        self.references
            .to_ranges(geometry, names, self.scope.sheet())
    }

    /* ─────────────────────────── range editing ─────────────────────────── */

    /// Append `range` to the union, in absolute notation. The new formula
    /// goes through [`set_refers_to`](Self::set_refers_to); on error the
    /// old one stays.
    pub fn add_range(&mut self, range: &SheetRange) -> Result<()> {
        let mut members: Vec<String> = self
            .references
            .members()
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        members.push(range.to_reference().to_string());
        self.set_members(&members)
    }

    /// Drop every union member that covers exactly `range`. Returns
    /// whether any was dropped.
    pub fn remove_range(&mut self, range: &SheetRange) -> Result<bool> {
        let anchor = self.scope.sheet();
        let members = self.references.members();
        let total = members.iter().filter(|m| !m.is_empty()).count();
        let kept: Vec<String> = members
            .into_iter()
            .filter(|m| !m.is_empty() && !member_is(m, range, anchor))
            .map(str::to_string)
            .collect();
        if kept.len() == total {
            return Ok(false);
        }
        self.set_members(&kept)?;
        Ok(true)
    }

    /// Replace the whole formula with the union of `ranges`.
    pub fn set_ranges(&mut self, ranges: &[SheetRange]) -> Result<()> {
        let members: Vec<String> = ranges
            .iter()
            .map(|r| r.to_reference().to_string())
            .collect();
        self.set_members(&members)
    }

    /// Empty the formula.
    pub fn clear(&mut self) {
        self.replace_references(ReferenceSet::default());
    }

    fn set_members(&mut self, members: &[String]) -> Result<()> {
        if members.is_empty() {
            self.clear();
            return Ok(());
        }
        self.set_refers_to(&members.join(","))
    }

    /// The parsed formula.
    pub fn ast(&self) -> Result<&ASTNode> {
        self.ast
            .get_or_init(|| parse(self.refers_to()))
            .as_ref()
            .map_err(|e| Error::invalid_formula(self.refers_to(), e.clone()))
    }

    /// The formula a copy of this name on `target` gets: references to
    /// `source` point at `target` instead.
    pub fn retargeted_formula(&self, source: &str, target: &str) -> Result<String> {
        if same_name(source, target) {
            return Err(Error::InvalidOperation(format!(
                "cannot copy `{}` onto its own sheet",
                self.name
            )));
        }
        let rewritten = self.references.rewrite(|r| {
            let sheet = r.sheet()?;
            same_name(sheet, source).then(|| {
                let mut moved = r.clone();
                moved.set_sheet(Some(target.to_string()));
                moved
            })
        });
        Ok(rewritten.unwrap_or_else(|| self.refers_to().to_string()))
    }
}

impl Display for DefinedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope.sheet() {
            Some(sheet) => write!(f, "{}!{}", quote_sheet_name(sheet), self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Whether a union member is a lone cell or range covering exactly
/// `range`. Unqualified members sit on `anchor`.
fn member_is(member: &str, range: &SheetRange, anchor: Option<&str>) -> bool {
    let Ok(reference) = Reference::parse(member) else {
        return false;
    };
    let Some(sheet) = reference.sheet().or(anchor) else {
        return false;
    };
    if !same_name(sheet, &range.sheet) {
        return false;
    }
    let area = match reference {
        Reference::Cell { cell, .. } => SheetRange::cell(&range.sheet, cell.row, cell.col),
        Reference::Range { from, to, .. } => {
            SheetRange::new(&range.sheet, from.row, from.col, to.row, to.col)
        }
        _ => return false,
    };
    area == *range
}

/// Extract and check `text` for a name in `scope`: the formula must parse
/// and may only leave references unqualified on a worksheet, where they
/// are qualified with that sheet.
pub(crate) fn strict_references(scope: &NameScope, text: &str) -> Result<ReferenceSet> {
    parse(text).map_err(|e| Error::invalid_formula(text, e))?;
    let references = extract_references(text)?;
    if !references.has_local_reference() {
        return Ok(references);
    }

    let Some(sheet) = scope.sheet() else {
        return Err(Error::InvalidReference(text.to_string()));
    };
    let qualified = references.rewrite(|r| {
        r.is_local().then(|| {
            let mut q = r.clone();
            q.set_sheet(Some(sheet.to_string()));
            q
        })
    });
    match qualified {
        Some(text) => extract_references(&text),
        None => Ok(references),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(scope: NameScope, text: &str) -> DefinedName {
        let refs = strict_references(&scope, text).unwrap();
        DefinedName::new(DefinedNameId(0), "Rate", scope, refs)
    }

    #[test]
    fn workbook_names_reject_local_references() {
        assert_eq!(
            strict_references(&NameScope::Workbook, "A1"),
            Err(Error::InvalidReference("A1".to_string()))
        );
    }

    #[test]
    fn worksheet_names_qualify_local_references() {
        let scope = NameScope::Worksheet("My Sheet".into());
        let refs = strict_references(&scope, "SUM(A1:B2)*Other!C3").unwrap();
        assert_eq!(refs.formula(), "SUM('My Sheet'!A1:B2)*Other!C3");
    }

    #[test]
    fn ast_is_cached_and_reset_on_change() {
        let mut n = name(NameScope::Workbook, "Sheet1!$A$1");
        assert!(n.ast().unwrap().is_reference());
        n.set_refers_to("1+2").unwrap();
        assert!(!n.ast().unwrap().is_reference());
        assert_eq!(n.refers_to(), "1+2");
    }

    #[test]
    fn self_reference_is_circular() {
        let mut n = name(NameScope::Workbook, "1");
        assert_eq!(
            n.set_refers_to("rate*2"),
            Err(Error::CircularName("Rate".to_string()))
        );
        assert_eq!(n.refers_to(), "1");
        n.set_refers_to("Sheet1!Rate").unwrap();
    }

    #[test]
    fn retargeting_moves_source_sheet_references() {
        let n = name(
            NameScope::Worksheet("Sheet1".into()),
            "Sheet1!A1+Sheet2!B1",
        );
        assert_eq!(
            n.retargeted_formula("Sheet1", "Copy").unwrap(),
            "Copy!A1+Sheet2!B1"
        );
        assert!(matches!(
            n.retargeted_formula("Sheet1", "sheet1"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn ranges_are_added_and_removed_as_union_members() {
        let mut n = name(NameScope::Workbook, "Sheet1!$A$1");
        let block = SheetRange::new("My Data", 2, 2, 4, 3);

        n.add_range(&block).unwrap();
        assert_eq!(n.refers_to(), "Sheet1!$A$1,'My Data'!$B$2:$C$4");
        assert_eq!(n.references().members().len(), 2);

        assert_eq!(n.remove_range(&SheetRange::cell("sheet1", 1, 1)), Ok(true));
        assert_eq!(n.refers_to(), "'My Data'!$B$2:$C$4");
        assert_eq!(n.remove_range(&SheetRange::cell("Sheet1", 1, 1)), Ok(false));

        assert_eq!(n.remove_range(&block), Ok(true));
        assert_eq!(n.refers_to(), "");
        n.add_range(&SheetRange::cell("Sheet2", 5, 1)).unwrap();
        assert_eq!(n.refers_to(), "Sheet2!$A$5");
    }

    #[test]
    fn set_ranges_and_clear_replace_the_formula() {
        let mut n = name(NameScope::Workbook, "SUM(Sheet1!A1:A3)");
        n.set_ranges(&[
            SheetRange::new("Sheet1", 1, 1, 10, 1),
            SheetRange::cell("Sheet2", 3, 3),
        ])
        .unwrap();
        assert_eq!(n.refers_to(), "Sheet1!$A$1:$A$10,Sheet2!$C$3");
        assert!(n.ast().is_ok());

        n.clear();
        assert_eq!(n.refers_to(), "");
        assert!(n.references().is_empty());
        n.set_ranges(&[]).unwrap();
        assert_eq!(n.refers_to(), "");
    }

    #[test]
    fn range_edits_revalidate_the_formula() {
        let loaded = extract_references("A1+1").unwrap();
        let mut n = DefinedName::new(DefinedNameId(0), "Loose", NameScope::Workbook, loaded);
        assert_eq!(
            n.add_range(&SheetRange::cell("Sheet1", 2, 2)),
            Err(Error::InvalidReference("A1+1,Sheet1!$B$2".into()))
        );
        assert_eq!(n.refers_to(), "A1+1");

        let mut local = name(NameScope::Worksheet("Sheet1".into()), "A1:B2,C3");
        assert_eq!(local.refers_to(), "Sheet1!A1:B2,Sheet1!C3");
        assert_eq!(local.remove_range(&SheetRange::new("Sheet1", 1, 1, 2, 2)), Ok(true));
        assert_eq!(local.refers_to(), "Sheet1!C3");
    }

    #[test]
    fn display_qualifies_sheet_names() {
        let n = name(NameScope::Worksheet("My Sheet".into()), "1");
        assert_eq!(n.to_string(), "'My Sheet'!Rate");
        assert_eq!(name(NameScope::Workbook, "1").to_string(), "Rate");
    }
}
