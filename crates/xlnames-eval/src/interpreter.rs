//! Tree-walking evaluator.
//!
//! [`Evaluator`] owns a [`FunctionRegistry`] and an [`EvalConfig`].
//! Each call gets an [`EvalContext`] naming the host grid, the defined-name
//! resolver and the sheet the formula lives on. Evaluation itself is done
//! by a short-lived [`Interpreter`] that borrows all three.
//!
//! Cell formulas and defined names are evaluated on demand when a reference
//! reaches them. Every such step counts against `EvalConfig::max_depth`;
//! once the limit trips the whole evaluation unwinds as `#NUM!` and
//! [`Evaluator::try_evaluate`] reports [`Error::Recursion`].

use std::cell::Cell;

use smallvec::{SmallVec, smallvec};
use xlnames_common::{
    ErrorKind, Locale, Value, coerce_to_number, coerce_to_text, compare_values,
};
use xlnames_parse::{ASTNode, ASTNodeType, Reference, parse};

use crate::config::EvalConfig;
use crate::error::Error;
use crate::registry::FunctionRegistry;
use crate::traits::{CellProvider, NameResolver, SheetRange};

/// Resolved areas of a reference expression, usually a single rectangle.
pub type Areas = SmallVec<[SheetRange; 1]>;

/* ───────────────────────────── context ───────────────────────────── */

/// Where a formula is being evaluated.
pub struct EvalContext<'a> {
    provider: &'a dyn CellProvider,
    names: Option<&'a dyn NameResolver>,
    sheet: String,
    depth: Cell<usize>,
    overflowed: Cell<bool>,
}

impl<'a> EvalContext<'a> {
    /// Evaluate against `provider`, with unqualified references bound to
    /// `sheet`.
    pub fn new(provider: &'a dyn CellProvider, sheet: impl Into<String>) -> Self {
        Self {
            provider,
            names: None,
            sheet: sheet.into(),
            depth: Cell::new(0),
            overflowed: Cell::new(false),
        }
    }

    pub fn with_names(mut self, names: &'a dyn NameResolver) -> Self {
        self.names = Some(names);
        self
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn set_sheet(&mut self, sheet: impl Into<String>) {
        self.sheet = sheet.into();
    }

    pub fn provider(&self) -> &'a dyn CellProvider {
        self.provider
    }

    pub fn names(&self) -> Option<&'a dyn NameResolver> {
        self.names
    }
}

/* ───────────────────────────── evaluator ───────────────────────────── */

pub struct Evaluator {
    registry: FunctionRegistry,
    config: EvalConfig,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl Evaluator {
    /// An evaluator with every built-in function registered.
    pub fn new(config: EvalConfig) -> Self {
        Self::with_registry(FunctionRegistry::with_builtins(), config)
    }

    pub fn with_registry(registry: FunctionRegistry, config: EvalConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Evaluate a parsed formula, failing when the depth limit is exceeded.
    pub fn try_evaluate(&self, ast: &ASTNode, ctx: &mut EvalContext<'_>) -> Result<Value, Error> {
        ctx.depth.set(0);
        ctx.overflowed.set(false);

        let value = Interpreter::new(&self.registry, &self.config, ctx).evaluate(ast);

        if ctx.overflowed.get() {
            Err(Error::Recursion {
                limit: self.config.max_depth,
            })
        } else {
            Ok(value)
        }
    }

    /// Evaluate a parsed formula. Exceeding the depth limit yields `#NUM!`.
    pub fn evaluate(&self, ast: &ASTNode, ctx: &mut EvalContext<'_>) -> Value {
        match self.try_evaluate(ast, ctx) {
            Ok(v) => v,
            Err(Error::Recursion { .. }) => Value::Error(ErrorKind::Num),
            Err(_) => Value::Error(ErrorKind::Value),
        }
    }

    /// Parse and evaluate formula text.
    pub fn evaluate_formula(
        &self,
        formula: &str,
        ctx: &mut EvalContext<'_>,
    ) -> Result<Value, Error> {
        let ast = parse(formula).map_err(|e| Error::invalid_formula(formula, e))?;
        self.try_evaluate(&ast, ctx)
    }
}

/* ───────────────────────────── interpreter ───────────────────────────── */

/// Outcome of resolving an expression that may denote cells.
pub(crate) enum Target {
    Areas(Areas),
    Scalar(Value),
}

pub struct Interpreter<'a> {
    registry: &'a FunctionRegistry,
    config: &'a EvalConfig,
    ctx: &'a EvalContext<'a>,
    sheet: &'a str,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        registry: &'a FunctionRegistry,
        config: &'a EvalConfig,
        ctx: &'a EvalContext<'a>,
    ) -> Self {
        Self {
            registry,
            config,
            ctx,
            sheet: ctx.sheet.as_str(),
        }
    }

    /// Sheet that unqualified references resolve against.
    pub fn current_sheet(&self) -> &'a str {
        self.sheet
    }

    pub fn config(&self) -> &'a EvalConfig {
        self.config
    }

    pub fn locale(&self) -> &'a Locale {
        &self.config.locale
    }

    pub fn registry(&self) -> &'a FunctionRegistry {
        self.registry
    }

    /// Evaluate a node to a single value.
    pub fn evaluate(&self, node: &ASTNode) -> Value {
        if self.ctx.overflowed.get() {
            return Value::Error(ErrorKind::Num);
        }
        match &node.node_type {
            ASTNodeType::Literal(v) => v.clone(),
            ASTNodeType::Reference { .. } => self.scalar(self.resolve_target(node)),
            ASTNodeType::UnaryOp { op, expr } => self.eval_unary(op, expr),
            ASTNodeType::BinaryOp { op, .. } if op == ":" || op == "," => {
                self.scalar(self.resolve_target(node))
            }
            ASTNodeType::BinaryOp { op, left, right } => self.eval_binary(op, left, right),
            ASTNodeType::Function { name, args } => self.call_function(name, args),
            ASTNodeType::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(|n| self.evaluate(n))
                .unwrap_or(Value::Blank),
        }
    }

    /// Value of one cell, evaluating its formula when it has one.
    pub fn cell_value(&self, sheet: &str, row: u32, col: u32) -> Value {
        let provider = self.ctx.provider;
        match provider.formula(sheet, row, col) {
            Some(ast) => self
                .descend(sheet, |nested| nested.evaluate(ast))
                .unwrap_or(Value::Error(ErrorKind::Num)),
            None => provider.value(sheet, row, col),
        }
    }

    /// Areas denoted by a reference expression.
    pub fn resolve_areas(&self, node: &ASTNode) -> Result<Areas, ErrorKind> {
        match self.resolve_target(node) {
            Target::Areas(areas) => Ok(areas),
            Target::Scalar(Value::Error(e)) => Err(e),
            Target::Scalar(_) => Err(ErrorKind::Value),
        }
    }

    pub fn call_function(&self, name: &str, args: &[ASTNode]) -> Value {
        let Some(entry) = self.registry.get(name) else {
            return Value::Error(ErrorKind::Name);
        };
        if !entry.accepts(args.len()) {
            return Value::Error(ErrorKind::Value);
        }
        let handles: SmallVec<[ArgumentHandle<'_, '_>; 4]> = args
            .iter()
            .map(|node| ArgumentHandle::new(node, self))
            .collect();
        (entry.eval)(&handles, self)
    }

    /* ===================  references  =================== */

    pub(crate) fn resolve_target(&self, node: &ASTNode) -> Target {
        if self.ctx.overflowed.get() {
            return Target::Scalar(Value::Error(ErrorKind::Num));
        }
        match &node.node_type {
            ASTNodeType::Reference { reference, .. } => self.resolve_reference(reference),
            ASTNodeType::BinaryOp { op, left, right } if op == "," => {
                match (self.resolve_target(left), self.resolve_target(right)) {
                    (Target::Areas(mut a), Target::Areas(b)) => {
                        a.extend(b);
                        Target::Areas(a)
                    }
                    (Target::Scalar(Value::Error(e)), _) | (_, Target::Scalar(Value::Error(e))) => {
                        Target::Scalar(Value::Error(e))
                    }
                    _ => Target::Scalar(Value::Error(ErrorKind::Value)),
                }
            }
            ASTNodeType::BinaryOp { op, left, right } if op == ":" => {
                match (self.resolve_target(left), self.resolve_target(right)) {
                    (Target::Areas(a), Target::Areas(b)) => bounding_area(&a, &b),
                    (Target::Scalar(Value::Error(e)), _) | (_, Target::Scalar(Value::Error(e))) => {
                        Target::Scalar(Value::Error(e))
                    }
                    _ => Target::Scalar(Value::Error(ErrorKind::Value)),
                }
            }
            _ => Target::Scalar(self.evaluate(node)),
        }
    }

    fn resolve_reference(&self, reference: &Reference) -> Target {
        match reference {
            Reference::Error { .. } => Target::Scalar(Value::Error(ErrorKind::Ref)),
            Reference::Table { table, column } => {
                match self.ctx.provider.table_area(table, column.as_deref()) {
                    Some(area) => Target::Areas(smallvec![area]),
                    None => Target::Scalar(Value::Error(ErrorKind::Ref)),
                }
            }
            Reference::Name { sheet, name } => self.resolve_name(sheet.as_deref(), name),
            grid => match SheetRange::from_reference(grid, self.sheet, self.ctx.provider) {
                Ok(Some(area)) => Target::Areas(smallvec![area]),
                Ok(None) => Target::Areas(SmallVec::new()),
                Err(e) => Target::Scalar(Value::Error(e)),
            },
        }
    }

    fn resolve_name(&self, qualifier: Option<&str>, name: &str) -> Target {
        let from = qualifier.unwrap_or(self.sheet);
        let found = self
            .ctx
            .names
            .and_then(|names| names.resolve_name(name, Some(from)));

        let Some(defined) = found else {
            return match self.ctx.provider.table_area(name, None) {
                Some(area) => Target::Areas(smallvec![area]),
                None => Target::Scalar(Value::Error(ErrorKind::Name)),
            };
        };
        let Ok(ast) = defined.ast() else {
            return Target::Scalar(Value::Error(ErrorKind::Name));
        };
        let anchor = defined.scope().sheet().unwrap_or(from);
        self.descend(anchor, |nested| nested.resolve_target(ast))
            .unwrap_or(Target::Scalar(Value::Error(ErrorKind::Num)))
    }

    fn scalar(&self, target: Target) -> Value {
        match target {
            Target::Scalar(v) => v,
            Target::Areas(areas) => match areas.as_slice() {
                [area] if area.is_single_cell() => {
                    self.cell_value(&area.sheet, area.start_row, area.start_col)
                }
                _ => Value::Error(ErrorKind::Value),
            },
        }
    }

    /// Run `f` one level deeper, on `sheet`. `None` once the depth limit is
    /// exceeded; the overflow then sticks for the rest of the evaluation.
    fn descend<R>(&self, sheet: &str, f: impl FnOnce(&Interpreter<'_>) -> R) -> Option<R> {
        let depth = self.ctx.depth.get();
        if depth >= self.config.max_depth {
            #[cfg(feature = "tracing")]
            tracing::trace!(limit = self.config.max_depth, sheet, "evaluation depth exceeded");
            self.ctx.overflowed.set(true);
            return None;
        }
        self.ctx.depth.set(depth + 1);
        let nested = Interpreter {
            registry: self.registry,
            config: self.config,
            ctx: self.ctx,
            sheet,
        };
        let out = f(&nested);
        self.ctx.depth.set(depth);
        Some(out)
    }

    /* ===================  operators  =================== */

    fn eval_unary(&self, op: &str, expr: &ASTNode) -> Value {
        let v = self.evaluate(expr);
        if op == "+" {
            return v;
        }
        let n = match coerce_to_number(&v, self.locale()) {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        match op {
            "-" => Value::from_f64(-n),
            "%" => Value::from_f64(n / 100.0),
            _ => Value::Error(ErrorKind::Value),
        }
    }

    fn eval_binary(&self, op: &str, left: &ASTNode, right: &ASTNode) -> Value {
        let l = self.evaluate(left);
        let r = self.evaluate(right);
        let locale = self.locale();

        match op {
            "&" => match (coerce_to_text(&l, locale), coerce_to_text(&r, locale)) {
                (Ok(a), Ok(b)) => Value::Text(a + &b),
                (Err(e), _) | (_, Err(e)) => Value::Error(e),
            },
            "=" | "<>" | "<" | "<=" | ">" | ">=" => match compare_values(&l, &r, locale) {
                Ok(ord) => Value::Boolean(match op {
                    "=" => ord.is_eq(),
                    "<>" => ord.is_ne(),
                    "<" => ord.is_lt(),
                    "<=" => ord.is_le(),
                    ">" => ord.is_gt(),
                    _ => ord.is_ge(),
                }),
                Err(e) => Value::Error(e),
            },
            _ => {
                let a = match coerce_to_number(&l, locale) {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                let b = match coerce_to_number(&r, locale) {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                arithmetic(op, a, b)
            }
        }
    }
}

fn arithmetic(op: &str, a: f64, b: f64) -> Value {
    match op {
        "+" => Value::from_f64(a + b),
        "-" => Value::from_f64(a - b),
        "*" => Value::from_f64(a * b),
        "/" if b == 0.0 => Value::Error(ErrorKind::Div),
        "/" => Value::from_f64(a / b),
        "^" => power(a, b),
        _ => Value::Error(ErrorKind::Value),
    }
}

/// `base ^ exp` with Excel's domain errors.
pub(crate) fn power(base: f64, exp: f64) -> Value {
    if base == 0.0 && exp == 0.0 {
        return Value::Error(ErrorKind::Num);
    }
    if base == 0.0 && exp < 0.0 {
        return Value::Error(ErrorKind::Div);
    }
    if base < 0.0 && exp.fract() != 0.0 {
        return Value::Error(ErrorKind::Num);
    }
    Value::from_f64(base.powf(exp))
}

/// `a:b` over two resolved references: the smallest rectangle covering both.
fn bounding_area(a: &[SheetRange], b: &[SheetRange]) -> Target {
    let mut all = a.iter().chain(b.iter());
    let Some(first) = all.next() else {
        return Target::Scalar(Value::Error(ErrorKind::Ref));
    };
    let mut out = first.clone();
    for area in all {
        if !area.sheet.eq_ignore_ascii_case(&out.sheet) {
            return Target::Scalar(Value::Error(ErrorKind::Value));
        }
        out.start_row = out.start_row.min(area.start_row);
        out.start_col = out.start_col.min(area.start_col);
        out.end_row = out.end_row.max(area.end_row);
        out.end_col = out.end_col.max(area.end_col);
    }
    Target::Areas(smallvec![out])
}

/* ───────────────────────────── arguments ───────────────────────────── */

/// Lazy view of one function argument. Nothing is evaluated until the
/// function asks for it.
pub struct ArgumentHandle<'a, 'b> {
    node: &'a ASTNode,
    interp: &'a Interpreter<'b>,
}

impl<'a, 'b> ArgumentHandle<'a, 'b> {
    pub(crate) fn new(node: &'a ASTNode, interp: &'a Interpreter<'b>) -> Self {
        Self { node, interp }
    }

    pub fn node(&self) -> &'a ASTNode {
        self.node
    }

    /// Scalar value. A multi-cell reference gives `#VALUE!`.
    pub fn value(&self) -> Value {
        self.interp.evaluate(self.node)
    }

    pub fn is_reference(&self) -> bool {
        self.node.is_reference()
    }

    pub fn is_array(&self) -> bool {
        matches!(self.node.node_type, ASTNodeType::Array(_))
    }

    /// References and array literals; aggregates read these with range
    /// rules rather than direct-argument rules.
    pub fn is_range_like(&self) -> bool {
        self.is_reference() || self.is_array()
    }

    /// An argument left empty, as the second one in `IF(A1,,1)`.
    pub fn is_omitted(&self) -> bool {
        self.node.span.is_none() && matches!(self.node.node_type, ASTNodeType::Literal(Value::Blank))
    }

    /// Areas the argument refers to.
    pub fn reference(&self) -> Result<Areas, ErrorKind> {
        self.interp.resolve_areas(self.node)
    }

    /// Every value of the argument: a reference's cells row by row, an
    /// array's elements, or the single scalar.
    pub fn values(&self) -> ArgValues<'a, 'b> {
        match &self.node.node_type {
            ASTNodeType::Array(rows) => ArgValues::Array(
                rows.iter()
                    .flatten()
                    .map(|n| self.interp.evaluate(n))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            _ if self.node.is_reference() => match self.interp.resolve_target(self.node) {
                Target::Areas(areas) => ArgValues::Range(RangeValues::new(self.interp, areas)),
                Target::Scalar(v) => ArgValues::Single(Some(v)),
            },
            _ => ArgValues::Single(Some(self.value())),
        }
    }
}

pub enum ArgValues<'a, 'b> {
    Single(Option<Value>),
    Array(std::vec::IntoIter<Value>),
    Range(RangeValues<'a, 'b>),
}

impl Iterator for ArgValues<'_, '_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ArgValues::Single(v) => v.take(),
            ArgValues::Array(it) => it.next(),
            ArgValues::Range(it) => it.next(),
        }
    }
}

/// Row-major walk over resolved areas, reading cells as it goes.
pub struct RangeValues<'a, 'b> {
    interp: &'a Interpreter<'b>,
    areas: Areas,
    index: usize,
    row: u32,
    col: u32,
}

impl<'a, 'b> RangeValues<'a, 'b> {
    fn new(interp: &'a Interpreter<'b>, areas: Areas) -> Self {
        let (row, col) = areas
            .first()
            .map(|a| (a.start_row, a.start_col))
            .unwrap_or((0, 0));
        Self {
            interp,
            areas,
            index: 0,
            row,
            col,
        }
    }
}

impl Iterator for RangeValues<'_, '_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        loop {
            let area = self.areas.get(self.index)?;
            if self.row <= area.end_row {
                let value = self.interp.cell_value(&area.sheet, self.row, self.col);
                if self.col < area.end_col {
                    self.col += 1;
                } else {
                    self.col = area.start_col;
                    self.row += 1;
                }
                return Some(value);
            }
            self.index += 1;
            if let Some(next) = self.areas.get(self.index) {
                self.row = next.start_row;
                self.col = next.start_col;
            }
        }
    }
}
