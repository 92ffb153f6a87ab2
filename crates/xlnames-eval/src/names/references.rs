//! The references embedded in a defined-name formula.

use rustc_hash::FxHashSet;
use xlnames_parse::{ParserError, Reference, TokenSubType, TokenType, Tokenizer};

use super::NameKey;
use crate::error::{Error, Result};
use crate::traits::{NameResolver, SheetGeometry, SheetRange};

/// One reference token: its byte span in the formula and what it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpan {
    pub start: usize,
    pub end: usize,
    pub reference: Reference,
}

/// Every reference in a formula, in source order, together with the
/// formula's top-level union members (the parts between depth-0 commas).
///
/// Two sets are equal when they name the same references in the same
/// order, wherever those sit in the text.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    formula: String,
    spans: Vec<ReferenceSpan>,
    members: Vec<(usize, usize)>,
}

impl PartialEq for ReferenceSet {
    fn eq(&self, other: &Self) -> bool {
        self.spans.len() == other.spans.len() && self.iter().eq(other.iter())
    }
}

/// Tokenize `formula` and collect its references.
///
/// String literals never contribute, and neither does anything inside an
/// array constant. A reference token that does not parse is an error, as
/// is a formula the tokenizer rejects.
pub fn extract_references(formula: &str) -> Result<ReferenceSet> {
    let tokens = Tokenizer::new(formula).map_err(|e| Error::invalid_formula(formula, e))?;

    let mut spans = Vec::new();
    let mut members = Vec::new();
    let mut member_start = usize::from(formula.starts_with('='));
    let mut depth = 0usize;
    let mut array_depth = 0usize;

    for token in &tokens.items {
        match (token.token_type, token.subtype) {
            (TokenType::Array, TokenSubType::Open) => {
                depth += 1;
                array_depth += 1;
            }
            (TokenType::Array, TokenSubType::Close) => {
                depth = depth.saturating_sub(1);
                array_depth = array_depth.saturating_sub(1);
            }
            (TokenType::Func | TokenType::Paren, TokenSubType::Open) => depth += 1,
            (TokenType::Func | TokenType::Paren, TokenSubType::Close) => {
                depth = depth.saturating_sub(1)
            }
            (TokenType::OpInfix, _) if depth == 0 && token.value == "," => {
                members.push((member_start, token.start));
                member_start = token.end;
            }
            _ if token.is_reference() && array_depth == 0 => {
                let reference = Reference::parse(&token.value).map_err(|e| {
                    Error::invalid_formula(
                        formula,
                        ParserError {
                            message: e.to_string(),
                            position: Some(token.start),
                        },
                    )
                })?;
                spans.push(ReferenceSpan {
                    start: token.start,
                    end: token.end,
                    reference,
                });
            }
            _ => {}
        }
    }
    members.push((member_start, formula.len()));

    Ok(ReferenceSet {
        formula: formula.to_string(),
        spans,
        members,
    })
}

impl ReferenceSet {
    /// The text the set was extracted from.
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.spans.iter().map(|s| &s.reference)
    }

    pub fn spans(&self) -> &[ReferenceSpan] {
        &self.spans
    }

    /// Top-level union members, trimmed. `A1,B2:C3` has two.
    pub fn members(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|&(start, end)| self.formula[start..end].trim())
            .collect()
    }

    /// Whether any reference is qualified with `sheet`.
    pub fn contains_sheet(&self, sheet: &str) -> bool {
        self.iter()
            .any(|r| r.sheet().is_some_and(|s| super::same_name(s, sheet)))
    }

    /// Whether any grid reference lacks a sheet qualifier.
    pub fn has_local_reference(&self) -> bool {
        self.iter().any(Reference::is_local)
    }

    /// `false` once a structural edit has broken part of the formula: a
    /// `#REF!` reference, or a member that starts or ends with `#REF!`.
    pub fn is_valid(&self) -> bool {
        if self.iter().any(Reference::is_error) {
            return false;
        }
        !self.members().iter().any(|member| {
            let upper = member.to_ascii_uppercase();
            upper.starts_with("#REF!") || upper.ends_with("#REF!")
        })
    }

    fn in_text_member(&self, span: &ReferenceSpan) -> bool {
        self.members
            .iter()
            .find(|&&(start, end)| span.start >= start && span.end <= end)
            .is_some_and(|&(start, end)| self.formula[start..end].trim_start().starts_with('"'))
    }

    /// Resolve every reference into the rectangles it covers.
    ///
    /// Unqualified references bind to `anchor`, or are skipped when there
    /// is none. Nested names are followed through `names`, each at most
    /// once, and fall back to a table of the same name. Members that start
    /// with a string literal, broken references and anything outside the
    /// sheets' dimensions contribute nothing.
    pub fn to_ranges<G: SheetGeometry + ?Sized>(
        &self,
        geometry: &G,
        names: Option<&dyn NameResolver>,
        anchor: Option<&str>,
    ) -> Vec<SheetRange> {
        let mut out = Vec::new();
        let mut visited = FxHashSet::default();
        self.collect_ranges(geometry, names, anchor, &mut visited, &mut out);
        out
    }

    fn collect_ranges<G: SheetGeometry + ?Sized>(
        &self,
        geometry: &G,
        names: Option<&dyn NameResolver>,
        anchor: Option<&str>,
        visited: &mut FxHashSet<NameKey>,
        out: &mut Vec<SheetRange>,
    ) {
        for span in &self.spans {
            if self.in_text_member(span) {
                continue;
            }
            match &span.reference {
                Reference::Error { .. } => {}
                Reference::Table { table, column } => {
                    out.extend(geometry.table_area(table, column.as_deref()));
                }
                Reference::Name { sheet, name } => {
                    let from = sheet.as_deref().or(anchor);
                    match names.and_then(|n| n.resolve_name(name, from)) {
                        Some(defined) => {
                            if visited.insert(defined.key()) {
                                let nested = defined.scope().sheet().or(from);
                                defined.references().collect_ranges(
                                    geometry, names, nested, visited, out,
                                );
                            }
                        }
                        None => out.extend(geometry.table_area(name, None)),
                    }
                }
                grid => {
                    let Some(default_sheet) = grid.sheet().or(anchor) else {
                        continue;
                    };
                    if let Ok(Some(area)) = SheetRange::from_reference(grid, default_sheet, geometry)
                    {
                        out.push(area);
                    }
                }
            }
        }
    }

    /// Apply `f` to every reference and splice the results into the
    /// formula. Spans for which `f` returns `None`, or an equal reference,
    /// keep their original text. `None` when nothing changed.
    pub fn rewrite(&self, mut f: impl FnMut(&Reference) -> Option<Reference>) -> Option<String> {
        let mut out = String::with_capacity(self.formula.len() + 8);
        let mut last = 0;
        let mut changed = false;

        for span in &self.spans {
            let Some(new) = f(&span.reference) else {
                continue;
            };
            if new == span.reference {
                continue;
            }
            out.push_str(&self.formula[last..span.start]);
            out.push_str(&new.to_string());
            last = span.end;
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&self.formula[last..]);
        Some(out)
    }
}
