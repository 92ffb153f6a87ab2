use rustc_hash::FxHashMap;

use super::defined_name::strict_references;
use super::{
    DefinedName, DefinedNameId, NameScope, ReferenceAdjuster, ReferenceSet, StructuralEdit,
    detect_cycle, extract_references, fold, same_name, validate_name,
};
use crate::error::{Error, Result};
use crate::traits::NameResolver;

/// The defined names of one scope, keyed case-insensitively.
#[derive(Debug, Clone)]
pub struct DefinedNames {
    scope: NameScope,
    names: FxHashMap<String, DefinedName>,
    next_id: u32,
}

impl DefinedNames {
    pub fn new(scope: NameScope) -> Self {
        Self {
            scope,
            names: FxHashMap::default(),
            next_id: 0,
        }
    }

    pub fn scope(&self) -> &NameScope {
        &self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: NameScope) {
        for defined in self.names.values_mut() {
            defined.set_scope(scope.clone());
        }
        self.scope = scope;
    }

    fn next_id(&mut self) -> DefinedNameId {
        let id = DefinedNameId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, name: &str, references: ReferenceSet) -> &mut DefinedName {
        let id = self.next_id();
        let defined = DefinedName::new(id, name, self.scope.clone(), references);
        self.names.entry(fold(name)).or_insert(defined)
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(Error::NameCollision(name.to_string()));
        }
        Ok(())
    }

    /// Add a name with strict validation.
    ///
    /// The name must satisfy [`is_valid_name`](super::is_valid_name) and be
    /// free in this scope. The formula must parse; unqualified references
    /// are rejected in the workbook scope and qualified with the sheet in a
    /// worksheet scope. A name that reaches itself through other names of
    /// this scope is rejected.
    pub fn add(&mut self, name: &str, refers_to: &str) -> Result<&mut DefinedName> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("add_defined_name", name, scope = %self.scope).entered();

        validate_name(name)?;
        self.ensure_free(name)?;
        let references = strict_references(&self.scope, refers_to)?;

        let key = fold(name);
        self.insert(name, references);
        if let Some(added) = self.names.get(&key) {
            if let Err(e) = detect_cycle(added, self) {
                self.names.remove(&key);
                return Err(e);
            }
        }
        self.get_mut(name)
            .ok_or_else(|| Error::InvalidOperation(format!("`{name}` vanished while adding")))
    }

    /// [`add`](Self::add), then attach `comment`.
    pub fn add_with_comment(
        &mut self,
        name: &str,
        refers_to: &str,
        comment: Option<&str>,
    ) -> Result<&mut DefinedName> {
        let added = self.add(name, refers_to)?;
        added.set_comment(comment.map(str::to_string));
        Ok(added)
    }

    /// Add a name read from a file. Name and formula are taken as they
    /// are; only collisions and untokenizable text are rejected.
    pub fn load(&mut self, name: &str, refers_to: &str) -> Result<&mut DefinedName> {
        if name.is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }
        self.ensure_free(name)?;
        let references = extract_references(refers_to)?;
        Ok(self.insert(name, references))
    }

    pub fn delete(&mut self, name: &str) -> Option<DefinedName> {
        self.names.remove(&fold(name))
    }

    pub fn delete_all(&mut self) {
        self.names.clear();
    }

    /// Rename `old` to `new`. Renaming to the same name, ignoring case,
    /// only changes its spelling.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let old_key = fold(old);
        if !self.names.contains_key(&old_key) {
            return Err(Error::InvalidOperation(format!("no defined name `{old}`")));
        }
        if same_name(old, new) {
            if let Some(defined) = self.names.get_mut(&old_key) {
                defined.set_display_name(new);
            }
            return Ok(());
        }
        validate_name(new)?;
        self.ensure_free(new)?;
        if let Some(mut defined) = self.names.remove(&old_key) {
            defined.set_display_name(new);
            self.names.insert(fold(new), defined);
        }
        Ok(())
    }

    /// Replace the formula of `name`, rejecting cycles within this scope.
    /// On error the old formula stays.
    pub fn set_refers_to(&mut self, name: &str, text: &str) -> Result<()> {
        let key = fold(name);
        let defined = self
            .names
            .get_mut(&key)
            .ok_or_else(|| Error::InvalidOperation(format!("no defined name `{name}`")))?;
        let previous = defined.references().clone();
        defined.set_refers_to(text)?;

        if let Some(updated) = self.names.get(&key) {
            if let Err(e) = detect_cycle(updated, self) {
                if let Some(defined) = self.names.get_mut(&key) {
                    defined.replace_references(previous);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DefinedName> {
        self.names.get(&fold(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DefinedName> {
        self.names.get_mut(&fold(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&fold(name))
    }

    /// All names, in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &DefinedName> {
        let mut all: Vec<_> = self.names.values().collect();
        all.sort_by_key(|n| n.id());
        all.into_iter()
    }

    pub fn valid_names(&self) -> impl Iterator<Item = &DefinedName> {
        self.iter().filter(|n| n.is_valid())
    }

    pub fn invalid_names(&self) -> impl Iterator<Item = &DefinedName> {
        self.iter().filter(|n| !n.is_valid())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rewrite every formula for `edit`. Returns how many changed.
    ///
    /// Either every affected formula is rewritten or, on error, none is.
    pub fn apply(&mut self, edit: &StructuralEdit, adjuster: &ReferenceAdjuster) -> Result<usize> {
        edit.validate()?;
        let pending = self.rewrites(edit, adjuster)?;
        Ok(self.commit(pending))
    }

    /// The new references of every name `edit` touches, keyed like
    /// `names`. Nothing is modified.
    pub(crate) fn rewrites(
        &self,
        edit: &StructuralEdit,
        adjuster: &ReferenceAdjuster,
    ) -> Result<Vec<(String, ReferenceSet)>> {
        let host = self.scope.sheet();
        let mut pending = Vec::new();
        for (key, defined) in &self.names {
            let Some(text) = defined
                .references()
                .rewrite(|r| adjuster.adjust_reference(r, host, edit))
            else {
                continue;
            };
            pending.push((key.clone(), extract_references(&text)?));
        }
        Ok(pending)
    }

    pub(crate) fn commit(&mut self, pending: Vec<(String, ReferenceSet)>) -> usize {
        let mut changed = 0;
        for (key, references) in pending {
            let Some(defined) = self.names.get_mut(&key) else {
                continue;
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(
                name = %defined,
                from = defined.refers_to(),
                to = references.formula(),
                "rewrote defined name"
            );
            defined.replace_references(references);
            changed += 1;
        }
        changed
    }
}

impl NameResolver for DefinedNames {
    /// Names of this scope alone; a worksheet container only answers for
    /// its own sheet or an unqualified lookup.
    fn resolve_name(&self, name: &str, from_sheet: Option<&str>) -> Option<&DefinedName> {
        let visible = match (self.scope.sheet(), from_sheet) {
            (Some(own), Some(from)) => same_name(own, from),
            _ => true,
        };
        visible.then(|| self.get(name)).flatten()
    }
}
