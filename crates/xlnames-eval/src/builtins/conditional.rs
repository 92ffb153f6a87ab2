//! `SUMIF`, `COUNTIF`, `AVERAGEIF`, `SUMIFS` and `COUNTIFS`.
//!
//! Criteria ranges must be references. The single-criterion forms take the
//! shape of the criteria range and read the value range from its top-left
//! corner, so `SUMIF(A1:A3,">0",B1)` sums `B1:B3`. The multi-criteria forms
//! require every range to have the same shape.

use xlnames_common::{ErrorKind, Value};

use super::utils::number_result;
use crate::criteria::Criteria;
use crate::interpreter::{ArgumentHandle, Interpreter};
use crate::registry::FunctionRegistry;
use crate::traits::SheetRange;

pub fn register(reg: &mut FunctionRegistry) {
    reg.register("SUMIF", 2, Some(3), sumif_fn);
    reg.register("COUNTIF", 2, Some(2), countif_fn);
    reg.register("AVERAGEIF", 2, Some(3), averageif_fn);
    reg.register("SUMIFS", 3, None, sumifs_fn);
    reg.register("COUNTIFS", 2, None, countifs_fn);
}

struct Condition {
    area: SheetRange,
    criteria: Criteria,
}

/// The one rectangle a range argument names; `None` for a band over an
/// empty sheet.
fn single_area(arg: &ArgumentHandle<'_, '_>) -> Result<Option<SheetRange>, ErrorKind> {
    if !arg.is_reference() {
        return Err(ErrorKind::Value);
    }
    let mut areas = arg.reference()?;
    match areas.len() {
        0 => Ok(None),
        1 => Ok(areas.pop()),
        _ => Err(ErrorKind::Value),
    }
}

/// Criteria pairs `(range, criterion)` from `args`. `None` when a range is
/// empty, in which case nothing can match.
fn conditions(
    args: &[ArgumentHandle<'_, '_>],
    interp: &Interpreter<'_>,
) -> Result<Option<Vec<Condition>>, ErrorKind> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(ErrorKind::Value);
    }
    let mut out = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let Some(area) = single_area(&pair[0])? else {
            return Ok(None);
        };
        let criteria = Criteria::new(&pair[1].value(), interp.locale());
        out.push(Condition { area, criteria });
    }
    Ok(Some(out))
}

/// Call `f` with the offsets, relative to each area's top-left corner,
/// of every position where all conditions hold.
fn for_each_match(
    interp: &Interpreter<'_>,
    conditions: &[Condition],
    mut f: impl FnMut(u32, u32) -> Result<(), ErrorKind>,
) -> Result<(), ErrorKind> {
    let Some(first) = conditions.first() else {
        return Ok(());
    };
    for i in 0..first.area.rows() {
        for j in 0..first.area.cols() {
            let hit = conditions.iter().all(|c| {
                let v = interp.cell_value(&c.area.sheet, c.area.start_row + i, c.area.start_col + j);
                c.criteria.matches(&v)
            });
            if hit {
                f(i, j)?;
            }
        }
    }
    Ok(())
}

/// Sum and count of the numeric cells of `values` at matching offsets.
fn sum_matches(
    interp: &Interpreter<'_>,
    conditions: &[Condition],
    values: &SheetRange,
) -> Result<(f64, usize), ErrorKind> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for_each_match(interp, conditions, |i, j| {
        match interp.cell_value(&values.sheet, values.start_row + i, values.start_col + j) {
            Value::Number(n) => {
                sum += n;
                count += 1;
            }
            Value::Error(e) => return Err(e),
            _ => {}
        }
        Ok(())
    })?;
    Ok((sum, count))
}

fn count_matches(interp: &Interpreter<'_>, conditions: &[Condition]) -> Result<usize, ErrorKind> {
    let mut count = 0usize;
    for_each_match(interp, conditions, |_, _| {
        count += 1;
        Ok(())
    })?;
    Ok(count)
}

fn same_shape(a: &SheetRange, b: &SheetRange) -> bool {
    a.rows() == b.rows() && a.cols() == b.cols()
}

/// Value range of the single-criterion forms: the optional third argument,
/// or the criteria range itself.
fn value_area(
    args: &[ArgumentHandle<'_, '_>],
    criteria_area: &SheetRange,
) -> Result<Option<SheetRange>, ErrorKind> {
    match args.get(2) {
        Some(arg) if !arg.is_omitted() => single_area(arg),
        _ => Ok(Some(criteria_area.clone())),
    }
}

/// `(sum, count)` for `SUMIF` and `AVERAGEIF`.
fn single_criterion(
    args: &[ArgumentHandle<'_, '_>],
    interp: &Interpreter<'_>,
) -> Result<(f64, usize), ErrorKind> {
    let Some(conds) = conditions(&args[..2], interp)? else {
        return Ok((0.0, 0));
    };
    match value_area(args, &conds[0].area)? {
        Some(values) => sum_matches(interp, &conds, &values),
        None => Ok((0.0, 0)),
    }
}

fn sumifs(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Result<f64, ErrorKind> {
    let sum_area = single_area(&args[0])?;
    let Some(conds) = conditions(&args[1..], interp)? else {
        return Ok(0.0);
    };
    let Some(sum_area) = sum_area else {
        return Ok(0.0);
    };
    if conds.iter().any(|c| !same_shape(&c.area, &sum_area)) {
        return Err(ErrorKind::Value);
    }
    sum_matches(interp, &conds, &sum_area).map(|(sum, _)| sum)
}

fn countifs(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Result<usize, ErrorKind> {
    let Some(conds) = conditions(args, interp)? else {
        return Ok(0);
    };
    if conds.iter().any(|c| !same_shape(&c.area, &conds[0].area)) {
        return Err(ErrorKind::Value);
    }
    count_matches(interp, &conds)
}

/* ─────────────────────────── SUMIF() / AVERAGEIF() ──────────────── */

fn sumif_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("SUMIF").entered();

    number_result(single_criterion(args, interp).map(|(sum, _)| sum))
}

fn averageif_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    number_result(single_criterion(args, interp).and_then(|(sum, count)| {
        if count == 0 {
            Err(ErrorKind::Div)
        } else {
            Ok(sum / count as f64)
        }
    }))
}

/* ─────────────────────────── COUNTIF() ──────────────────────────── */

fn countif_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    number_result(
        conditions(args, interp).and_then(|conds| match conds {
            Some(conds) => count_matches(interp, &conds).map(|n| n as f64),
            None => Ok(0.0),
        }),
    )
}

/* ─────────────────────────── SUMIFS() / COUNTIFS() ──────────────── */

fn sumifs_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("SUMIFS").entered();

    number_result(sumifs(args, interp))
}

fn countifs_fn(args: &[ArgumentHandle<'_, '_>], interp: &Interpreter<'_>) -> Value {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("COUNTIFS").entered();

    number_result(countifs(args, interp).map(|n| n as f64))
}
