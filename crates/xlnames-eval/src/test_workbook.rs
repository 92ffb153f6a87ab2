//! crates/xlnames-eval/src/test_workbook.rs
//! ----------------------------------------
//! Lightweight in-memory workbook for unit and property tests.
use rustc_hash::FxHashMap;
use xlnames_common::Value;
use xlnames_parse::{ASTNode, parse};

use crate::config::EvalConfig;
use crate::error::Result;
use crate::interpreter::{EvalContext, Evaluator};
use crate::names::{WorkbookNames, fold};
use crate::traits::{CellProvider, SheetGeometry, SheetRange};

type CellKey = (u32, u32); // 1-based (row, col)

#[derive(Default, Clone)]
struct Sheet {
    name: String,
    cells: FxHashMap<CellKey, Value>,
    formulas: FxHashMap<CellKey, ASTNode>,
    size: Option<(u32, u32)>,
}

impl Sheet {
    fn extent(&self) -> (u32, u32) {
        if let Some(size) = self.size {
            return size;
        }
        self.cells
            .keys()
            .chain(self.formulas.keys())
            .fold((0, 0), |(rows, cols), &(r, c)| (rows.max(r), cols.max(c)))
    }
}

struct Table {
    sheet: String,
    header_row: u32,
    first_col: u32,
    columns: Vec<String>,
    rows: u32,
}

#[derive(Default)]
pub struct TestWorkbook {
    sheets: FxHashMap<String, Sheet>,
    tables: FxHashMap<String, Table>,
    names: WorkbookNames,
    evaluator: Evaluator,
}

impl TestWorkbook {
    /* ─────────────── constructors ─────────────── */
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.evaluator = Evaluator::new(config);
        self
    }

    fn sheet_entry(&mut self, sheet: &str) -> &mut Sheet {
        if self.names.sheet(sheet).is_none() {
            let _ = self.names.add_sheet(sheet);
        }
        self.sheets.entry(fold(sheet)).or_insert_with(|| Sheet {
            name: sheet.to_string(),
            ..Sheet::default()
        })
    }

    /// A sheet with a fixed used extent.
    pub fn with_sheet(mut self, sheet: &str, rows: u32, cols: u32) -> Self {
        self.sheet_entry(sheet).size = Some((rows, cols));
        self
    }

    /* ─────────────── cell helpers ─────────────── */
    pub fn with_cell(mut self, sheet: &str, row: u32, col: u32, v: Value) -> Self {
        self.sheet_entry(sheet).cells.insert((row, col), v);
        self
    }

    pub fn with_range(mut self, sheet: &str, row: u32, col: u32, data: Vec<Vec<Value>>) -> Self {
        let sh = self.sheet_entry(sheet);
        for (r_off, r) in data.into_iter().enumerate() {
            for (c_off, v) in r.into_iter().enumerate() {
                sh.cells.insert((row + r_off as u32, col + c_off as u32), v);
            }
        }
        self
    }

    pub fn with_formula(mut self, sheet: &str, row: u32, col: u32, formula: &str) -> Self {
        let ast = parse(formula).expect("bad formula in with_formula");
        self.sheet_entry(sheet).formulas.insert((row, col), ast);
        self
    }

    /* ─────────────── tables ─────────────── */
    /// A table whose header row is `header_row`, followed by `rows` data
    /// rows.
    pub fn with_table(
        mut self,
        name: &str,
        sheet: &str,
        header_row: u32,
        first_col: u32,
        columns: &[&str],
        rows: u32,
    ) -> Self {
        self.sheet_entry(sheet);
        self.tables.insert(
            fold(name),
            Table {
                sheet: sheet.to_string(),
                header_row,
                first_col,
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
        self
    }

    /* ─────────────── defined names ─────────────── */
    pub fn with_name(mut self, name: &str, refers_to: &str) -> Self {
        self.names
            .workbook_mut()
            .add(name, refers_to)
            .expect("bad workbook name in with_name");
        self
    }

    pub fn with_sheet_name(mut self, sheet: &str, name: &str, refers_to: &str) -> Self {
        self.sheet_entry(sheet);
        self.names
            .sheet_mut(sheet)
            .expect("sheet registered above")
            .add(name, refers_to)
            .expect("bad worksheet name in with_sheet_name");
        self
    }

    pub fn names(&self) -> &WorkbookNames {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut WorkbookNames {
        &mut self.names
    }

    /* ─────────────── evaluation ─────────────── */
    pub fn try_evaluate(&self, sheet: &str, formula: &str) -> Result<Value> {
        let mut ctx = EvalContext::new(self, sheet).with_names(&self.names);
        self.evaluator.evaluate_formula(formula, &mut ctx)
    }

    /// Evaluate `formula` as if it lived on `sheet`.
    pub fn evaluate(&self, sheet: &str, formula: &str) -> Value {
        let ast = parse(formula).expect("bad formula in evaluate");
        let mut ctx = EvalContext::new(self, sheet).with_names(&self.names);
        self.evaluator.evaluate(&ast, &mut ctx)
    }
}

impl SheetGeometry for TestWorkbook {
    fn dimensions(&self, sheet: &str) -> Option<(u32, u32)> {
        self.sheets.get(&fold(sheet)).map(Sheet::extent)
    }

    fn table_area(&self, table: &str, column: Option<&str>) -> Option<SheetRange> {
        let t = self.tables.get(&fold(table))?;
        let last_row = t.header_row + t.rows;
        let last_col = t.first_col + t.columns.len() as u32 - 1;
        let data = SheetRange::new(&t.sheet, t.header_row + 1, t.first_col, last_row, last_col);
        match column {
            None => Some(data),
            Some(c) if c.eq_ignore_ascii_case("#Data") => Some(data),
            Some(c) if c.eq_ignore_ascii_case("#All") => Some(SheetRange {
                start_row: t.header_row,
                ..data
            }),
            Some(c) => {
                let idx = t.columns.iter().position(|h| h.eq_ignore_ascii_case(c))? as u32;
                let col = t.first_col + idx;
                Some(SheetRange::new(&t.sheet, t.header_row + 1, col, last_row, col))
            }
        }
    }
}

impl CellProvider for TestWorkbook {
    fn value(&self, sheet: &str, row: u32, col: u32) -> Value {
        self.sheets
            .get(&fold(sheet))
            .and_then(|s| s.cells.get(&(row, col)))
            .cloned()
            .unwrap_or(Value::Blank)
    }

    fn formula(&self, sheet: &str, row: u32, col: u32) -> Option<&ASTNode> {
        self.sheets.get(&fold(sheet))?.formulas.get(&(row, col))
    }
}
