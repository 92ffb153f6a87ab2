use xlnames_eval::test_workbook::TestWorkbook;
use xlnames_eval::{
    Error, InsertBoundaryPolicy, RewritePolicy, SheetRange, StructuralEdit, WorkbookNames,
};

fn book() -> WorkbookNames {
    let mut names = WorkbookNames::new();
    names.add_sheet("Sheet1").unwrap();
    names.add_sheet("Sheet2").unwrap();
    names
}

fn formula_of(names: &WorkbookNames, name: &str, from: Option<&str>) -> String {
    names.resolve(name, from).unwrap().refers_to().to_string()
}

#[test]
fn noop_edits_leave_every_formula_byte_identical() {
    let mut names = book();
    let wb = names.workbook_mut();
    wb.add("Spaced", "SUM( Sheet1!$A$1 , 2 )").unwrap();
    wb.add("Lower", "sheet1!a1:b2").unwrap();
    wb.load("Floating", "A1+Sheet2!C3").unwrap();
    names.sheet_mut("Sheet1").unwrap().load("Local", "$B$2").unwrap();

    let before: Vec<String> = names.iter().map(|n| n.refers_to().to_string()).collect();

    assert_eq!(names.insert_rows("Sheet1", 1, 0), Ok(0));
    assert_eq!(names.delete_columns("Sheet1", 1, 0), Ok(0));
    assert_eq!(names.rename_sheet("Sheet1", "Sheet1").unwrap(), 0);
    assert_eq!(names.insert_rows("Sheet3", 1, 10), Ok(0));

    let after: Vec<String> = names.iter().map(|n| n.refers_to().to_string()).collect();
    assert_eq!(before, after);
}

#[test]
fn inserting_rows_shifts_absolute_references() {
    let mut names = book();
    names.workbook_mut().add("Target", "Sheet1!$B$2").unwrap();

    assert_eq!(names.insert_rows("Sheet1", 1, 2), Ok(1));
    assert_eq!(formula_of(&names, "Target", None), "Sheet1!$B$4");

    assert_eq!(names.insert_rows("Sheet2", 1, 2), Ok(0));
    assert_eq!(formula_of(&names, "Target", None), "Sheet1!$B$4");
}

#[test]
fn deleting_every_row_of_a_range_breaks_the_name() {
    let wb = TestWorkbook::new().with_sheet("Sheet1", 20, 5);
    let mut names = book();
    names.workbook_mut().add("Block", "Sheet1!$A$1:$A$5").unwrap();
    assert_eq!(
        names.resolve("Block", None).unwrap().ranges(&wb, Some(&names)),
        vec![SheetRange::new("Sheet1", 1, 1, 5, 1)]
    );

    names.delete_rows("Sheet1", 1, 5).unwrap();

    let block = names.resolve("Block", None).unwrap();
    assert!(block.refers_to().contains("#REF!"));
    assert!(!block.is_valid());
    assert!(block.ranges(&wb, Some(&names)).is_empty());
    let invalid: Vec<_> = names.workbook().invalid_names().map(|n| n.name()).collect();
    assert_eq!(invalid, ["Block"]);
}

#[test]
fn partial_deletes_shrink_ranges() {
    let mut names = book();
    names.workbook_mut().add("Block", "Sheet1!$A$1:$A$10").unwrap();
    names.workbook_mut().add("Below", "Sheet1!$C$20").unwrap();

    assert_eq!(names.delete_rows("Sheet1", 3, 4), Ok(2));
    assert_eq!(formula_of(&names, "Block", None), "Sheet1!$A$1:$A$6");
    assert_eq!(formula_of(&names, "Below", None), "Sheet1!$C$16");
}

#[test]
fn worksheet_names_rewrite_their_unqualified_references() {
    let mut names = book();
    names.sheet_mut("Sheet1").unwrap().load("Here", "B2").unwrap();
    names.sheet_mut("Sheet2").unwrap().load("There", "B2").unwrap();

    names.insert_columns("Sheet1", 1, 1).unwrap();
    assert_eq!(formula_of(&names, "Here", Some("Sheet1")), "C2");
    assert_eq!(formula_of(&names, "There", Some("Sheet2")), "B2");
}

#[test]
fn expand_policy_grows_ranges_at_the_boundary() {
    let mut names = WorkbookNames::with_policy(RewritePolicy {
        insert_boundary: InsertBoundaryPolicy::Expand,
    });
    names.add_sheet("Sheet1").unwrap();
    names.workbook_mut().add("Grow", "Sheet1!$A$2:$A$4").unwrap();

    names.insert_rows("Sheet1", 2, 3).unwrap();
    assert_eq!(formula_of(&names, "Grow", None), "Sheet1!$A$2:$A$7");
}

#[test]
fn renaming_a_sheet_rewrites_and_rescopes() {
    let mut names = book();
    names.workbook_mut().add("Total", "SUM(Sheet1!$A$1:$A$3)").unwrap();
    names.sheet_mut("Sheet1").unwrap().add("Local", "$B$1").unwrap();

    assert_eq!(names.rename_sheet("Sheet1", "Q1 Data").unwrap(), 2);
    assert_eq!(formula_of(&names, "Total", None), "SUM('Q1 Data'!$A$1:$A$3)");
    assert_eq!(
        formula_of(&names, "Local", Some("Q1 Data")),
        "'Q1 Data'!$B$1"
    );
    assert!(names.sheet("Sheet1").is_none());
    assert_eq!(
        names.resolve("Local", Some("q1 data")).unwrap().to_string(),
        "'Q1 Data'!Local"
    );

    assert_eq!(
        names.rename_sheet("Q1 Data", "Sheet2"),
        Err(Error::InvalidOperation("worksheet `Sheet2` already exists".into()))
    );
    assert_eq!(
        names.rename_sheet("Nope", "Other"),
        Err(Error::UnknownSheet("Nope".into()))
    );
}

#[test]
fn malformed_edits_fail_without_touching_any_name() {
    let mut names = book();
    names.workbook_mut().add("X", "Sheet1!$A$1").unwrap();
    names.workbook_mut().add("Block", "Sheet1!$A$1:$A$5").unwrap();
    let before: Vec<String> = names.iter().map(|n| n.refers_to().to_string()).collect();

    assert_eq!(names.rename_sheet("Sheet1", ""), Err(Error::InvalidName(String::new())));
    assert_eq!(
        names.rename_sheet("Sheet1", "Q1/Q2"),
        Err(Error::InvalidName("Q1/Q2".into()))
    );
    assert!(matches!(names.delete_rows("Sheet1", 0, 2), Err(Error::InvalidOperation(_))));
    assert!(matches!(
        names.insert_columns("Sheet1", 16_385, 1),
        Err(Error::InvalidOperation(_))
    ));

    let after: Vec<String> = names.iter().map(|n| n.refers_to().to_string()).collect();
    assert_eq!(before, after);
    assert_eq!(names.sheet_names().collect::<Vec<_>>(), ["Sheet1", "Sheet2"]);
}

#[test]
fn deleting_a_sheet_drops_its_names_and_breaks_references() {
    let mut names = book();
    names.workbook_mut().add("Remote", "Sheet2!$A$1+Sheet1!$A$1").unwrap();
    names.sheet_mut("Sheet2").unwrap().add("Gone", "1").unwrap();

    assert_eq!(names.delete_sheet("Sheet2").unwrap(), 1);
    assert_eq!(formula_of(&names, "Remote", None), "#REF!+Sheet1!$A$1");
    assert!(names.resolve("Gone", Some("Sheet2")).is_none());
    assert_eq!(names.sheet_names().collect::<Vec<_>>(), ["Sheet1"]);
    assert_eq!(
        names.delete_sheet("Sheet2"),
        Err(Error::UnknownSheet("Sheet2".into()))
    );
}

#[test]
fn copying_a_name_retargets_its_sheet() {
    let mut names = book();
    let local = names.sheet_mut("Sheet1").unwrap().add("Area", "$A$1:$B$2").unwrap();
    local.set_comment(Some("input block".into()));
    local.set_visible(false);

    let copy = names.copy_name("Area", "Sheet1", "Sheet2").unwrap();
    assert_eq!(copy.refers_to(), "Sheet2!$A$1:$B$2");
    assert_eq!(copy.comment(), Some("input block"));
    assert!(!copy.is_visible());

    assert!(matches!(
        names.copy_name("Area", "Sheet1", "Sheet1"),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(
        names.copy_name("Area", "Sheet1", "Sheet2").err(),
        Some(Error::NameCollision("Area".into()))
    );
}

#[test]
fn names_are_edited_range_by_range() {
    let wb = TestWorkbook::new()
        .with_sheet("Sheet1", 20, 5)
        .with_sheet("Sheet2", 20, 5);
    let mut names = book();
    names
        .workbook_mut()
        .add_with_comment("Inputs", "Sheet1!$A$1:$A$3", Some("entered by hand"))
        .unwrap();

    let inputs = names.workbook_mut().get_mut("Inputs").unwrap();
    inputs.add_range(&SheetRange::new("Sheet2", 2, 2, 3, 3)).unwrap();
    inputs.add_range(&SheetRange::cell("Sheet1", 10, 1)).unwrap();
    assert_eq!(
        inputs.refers_to(),
        "Sheet1!$A$1:$A$3,Sheet2!$B$2:$C$3,Sheet1!$A$10"
    );
    assert!(inputs.remove_range(&SheetRange::new("Sheet2", 2, 2, 3, 3)).unwrap());

    names.insert_rows("Sheet1", 5, 2).unwrap();
    let inputs = names.resolve("Inputs", None).unwrap();
    assert_eq!(inputs.comment(), Some("entered by hand"));
    assert_eq!(
        inputs.ranges(&wb, Some(&names)),
        vec![
            SheetRange::new("Sheet1", 1, 1, 3, 1),
            SheetRange::cell("Sheet1", 12, 1),
        ]
    );

    let inputs = names.workbook_mut().get_mut("Inputs").unwrap();
    inputs.set_ranges(&[SheetRange::cell("Sheet2", 1, 1)]).unwrap();
    assert_eq!(inputs.refers_to(), "Sheet2!$A$1");
    inputs.clear();
    assert!(inputs.ranges(&wb, None).is_empty());
}
