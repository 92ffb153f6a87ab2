//! Function registry.
//!
//! A registry is an ordinary value owned by the [`Evaluator`]; two
//! evaluators never share registrations. Lookups are case-insensitive and
//! ignore the `_xlfn.` prefix Excel writes in front of newer functions.
//!
//! [`Evaluator`]: crate::Evaluator

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use xlnames_common::Value;

use crate::interpreter::{ArgumentHandle, Interpreter};

/// Signature every function implementation has.
pub type EvalFn = dyn Fn(&[ArgumentHandle<'_, '_>], &Interpreter<'_>) -> Value + Send + Sync;

/// One registered function.
#[derive(Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    pub eval: Arc<EvalFn>,
}

impl FunctionEntry {
    pub fn accepts(&self, arity: usize) -> bool {
        arity >= self.min_args && self.max_args.is_none_or(|max| arity <= max)
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    entries: FxHashMap<String, FunctionEntry>,
}

fn normalize(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    match upper.strip_prefix("_XLFN.") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        crate::builtins::register_builtins(&mut reg);
        reg
    }

    /// Add or replace a function.
    pub fn register<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, eval: F)
    where
        F: Fn(&[ArgumentHandle<'_, '_>], &Interpreter<'_>) -> Value + Send + Sync + 'static,
    {
        let key = normalize(name);
        self.entries.insert(
            key.clone(),
            FunctionEntry {
                name: key,
                min_args,
                max_args,
                eval: Arc::new(eval),
            },
        );
    }

    /// Register `alias` as another name for an existing function.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        let Some(entry) = self.get(target).cloned() else {
            return false;
        };
        let key = normalize(alias);
        self.entries.insert(
            key.clone(),
            FunctionEntry {
                name: key,
                ..entry
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(&normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<FunctionEntry> {
        self.entries.remove(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_xlfn_prefix() {
        let mut reg = FunctionRegistry::new();
        reg.register("STDEV.S", 1, None, |_, _| Value::Number(0.0));
        assert!(reg.contains("stdev.s"));
        assert!(reg.contains("_xlfn.STDEV.S"));
        assert!(reg.contains("_XLFN.stdev.s"));
        assert!(!reg.contains("STDEV"));
    }

    #[test]
    fn arity_bounds() {
        let mut reg = FunctionRegistry::new();
        reg.register("TWO", 1, Some(2), |_, _| Value::Blank);
        reg.register("ANY", 0, None, |_, _| Value::Blank);
        let two = reg.get("two").unwrap();
        assert!(!two.accepts(0));
        assert!(two.accepts(2));
        assert!(!two.accepts(3));
        assert!(reg.get("any").unwrap().accepts(255));
    }

    #[test]
    fn alias_copies_bounds() {
        let mut reg = FunctionRegistry::new();
        reg.register("VAR.S", 1, None, |_, _| Value::Blank);
        assert!(reg.alias("VAR", "VAR.S"));
        assert!(!reg.alias("X", "MISSING"));
        let var = reg.get("VAR").unwrap();
        assert_eq!(var.name, "VAR");
        assert_eq!(var.min_args, 1);
    }

    #[test]
    fn builtins_are_registered() {
        let reg = FunctionRegistry::with_builtins();
        for name in ["SUM", "IF", "SUMIFS", "VAR", "CONCAT", "WEEKDAY", "ERROR.TYPE"] {
            assert!(reg.contains(name), "{name} missing");
        }
    }
}
