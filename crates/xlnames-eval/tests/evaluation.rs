use xlnames_eval::test_workbook::TestWorkbook;
use xlnames_eval::{
    CellProvider, DefinedNames, EvalConfig, EvalContext, Error, ErrorKind, Evaluator, NameScope,
    SheetGeometry, Value, WorkbookNames,
};

fn setup() {
    #[cfg(feature = "tracing")]
    xlnames_eval::init_tracing();
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn ledger() -> TestWorkbook {
    TestWorkbook::new()
        .with_range(
            "Sheet1",
            1,
            1,
            vec![
                vec![Value::text("north"), num(100.0)],
                vec![Value::text("south"), num(250.0)],
                vec![Value::text("north"), num(75.0)],
                vec![Value::text("east"), Value::Boolean(true)],
            ],
        )
        .with_cell("Sheet2", 1, 1, num(3.0))
        .with_name("Rate", "0.05")
        .with_sheet_name("Sheet1", "Rate", "0.07")
        .with_name("Regions", "Sheet1!$A$1:$A$4")
        .with_name("Amounts", "Sheet1!$B$1:$B$4")
}

#[test]
fn worksheet_scope_wins_over_workbook_scope() {
    setup();
    let wb = ledger();
    assert_eq!(wb.evaluate("Sheet1", "=Rate"), num(0.07));
    assert_eq!(wb.evaluate("Sheet2", "=Rate"), num(0.05));
    assert_eq!(wb.evaluate("Sheet2", "=Sheet1!Rate*100"), num(7.0));
    assert_eq!(wb.evaluate("Sheet2", "=Sheet2!Rate"), num(0.05));
}

#[test]
fn aggregates_over_named_ranges() {
    setup();
    let wb = ledger();
    assert_eq!(wb.evaluate("Sheet2", "=SUM(Amounts)"), num(425.0));
    assert_eq!(wb.evaluate("Sheet2", "=COUNT(Amounts)"), num(3.0));
    assert_eq!(wb.evaluate("Sheet2", "=COUNTA(Amounts)"), num(4.0));
    assert_eq!(wb.evaluate("Sheet2", "=SUMIF(Regions,\"north\",Amounts)"), num(175.0));
    assert_eq!(wb.evaluate("Sheet2", "=COUNTIF(Regions,\"N*\")"), num(2.0));
    assert_eq!(
        wb.evaluate("Sheet2", "=SUMIFS(Amounts,Regions,\"<>north\",Amounts,\">100\")"),
        num(250.0)
    );
    assert_eq!(wb.evaluate("Sheet2", "=SUM(Amounts)*A1"), num(1275.0));
}

#[test]
fn errors_propagate_until_absorbed() {
    setup();
    let wb = ledger().with_name("Broken", "Sheet1!$B$1/0");
    assert_eq!(wb.evaluate("Sheet1", "=Broken"), Value::Error(ErrorKind::Div));
    assert_eq!(wb.evaluate("Sheet1", "=SUM(Amounts,Broken)"), Value::Error(ErrorKind::Div));
    assert_eq!(wb.evaluate("Sheet1", "=IFERROR(Broken,-1)"), num(-1.0));
    assert_eq!(wb.evaluate("Sheet1", "=ISERROR(Broken)"), Value::Boolean(true));
    assert_eq!(wb.evaluate("Sheet1", "=ERROR.TYPE(Missing)"), num(5.0));
}

#[test]
fn invalid_names_are_rejected() {
    setup();
    let mut names = WorkbookNames::new();
    assert_eq!(
        names.workbook_mut().add("1Foo", "Sheet1!$A$1").err(),
        Some(Error::InvalidName("1Foo".into()))
    );
    assert_eq!(
        names.workbook_mut().add("A1", "1").err(),
        Some(Error::InvalidName("A1".into()))
    );
    assert_eq!(
        names.workbook_mut().add("Foo", "A1").err(),
        Some(Error::InvalidReference("A1".into()))
    );
    assert!(names.is_empty());

    let mut local = DefinedNames::new(NameScope::Worksheet("Sheet1".into()));
    assert_eq!(local.add("Foo", "A1").unwrap().refers_to(), "Sheet1!A1");
}

#[test]
fn cross_scope_cycles_are_detected() {
    setup();
    let wb = TestWorkbook::new()
        .with_cell("Sheet2", 1, 1, num(1.0))
        .with_name("Outer", "Sheet1!Inner+1")
        .with_sheet_name("Sheet1", "Inner", "Outer*2");

    assert_eq!(
        wb.names().check_cycles(),
        Err(Error::CircularName("Outer".into()))
    );
    assert_eq!(wb.evaluate("Sheet2", "=Outer"), Value::Error(ErrorKind::Num));
}

#[test]
fn recursion_is_bounded() {
    setup();
    let mut wb = TestWorkbook::new()
        .with_config(EvalConfig::default().with_max_depth(8))
        .with_cell("Sheet1", 1, 1, num(1.0));
    {
        let names = wb.names_mut().workbook_mut();
        names.load("Ping", "Pong").unwrap();
        names.load("Pong", "Ping").unwrap();
    }
    assert_eq!(
        wb.try_evaluate("Sheet1", "=Ping"),
        Err(Error::Recursion { limit: 8 })
    );
    assert_eq!(wb.evaluate("Sheet1", "=Ping+1"), Value::Error(ErrorKind::Num));
    assert_eq!(wb.evaluate("Sheet1", "=IFERROR(Ping,0)"), Value::Error(ErrorKind::Num));
}

/// A host that keeps nothing but one constant column.
struct Column;

impl SheetGeometry for Column {
    fn dimensions(&self, sheet: &str) -> Option<(u32, u32)> {
        (sheet == "Data").then_some((10, 1))
    }
}

impl CellProvider for Column {
    fn value(&self, _sheet: &str, row: u32, _col: u32) -> Value {
        Value::Number(f64::from(row))
    }
}

#[test]
fn evaluator_runs_against_any_host() {
    setup();
    let mut names = WorkbookNames::new();
    names.add_sheet("Data").unwrap();
    names.workbook_mut().add("Everything", "Data!$A:$A").unwrap();

    let evaluator = Evaluator::default();
    let mut ctx = EvalContext::new(&Column, "Data").with_names(&names);
    assert_eq!(evaluator.evaluate_formula("=SUM(Everything)", &mut ctx), Ok(num(55.0)));
    assert_eq!(evaluator.evaluate_formula("=A4*2", &mut ctx), Ok(num(8.0)));
    assert_eq!(
        evaluator.evaluate_formula("=Elsewhere!A1", &mut ctx),
        Ok(Value::Error(ErrorKind::Ref))
    );
}
