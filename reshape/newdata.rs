//! # Prediction Frames
//!
//! `make_newdata` builds the frame a fitted model is evaluated on: every
//! combination of the caller's assigned values, with every other column held
//! at a representative value (mean or mode). Person-period data additionally
//! gets consistent interval bookkeeping (`tstart`, `tend`, `interval_length`,
//! `offset`, `status_in_interval`), and functional person-period data gets its
//! matrix-valued exposure terms and lag-lead indicators.
//!
//! Dispatch is an explicit match on [`DatasetKind`]. The person-period builder
//! runs the default one on the de-intervalized frame, and the functional one
//! runs the person-period one on the scalar part.

use log::{debug, info};
use polars::prelude::*;

use crate::assign::{AssignedValue, Assignment, Evaluated, evaluate};
use crate::combine::{combine_frames, concat_columns, join_on};
use crate::dataset::{DatasetKind, FunctionalMeta, PedMeta, TabularDataset};
use crate::error::ReshapeError;
use crate::frame_ops::{float_values, has_column};
use crate::functional::{adjust_lag_lead, summarize_functional};
use crate::intervals::{
    INTERVAL_COLUMNS, INTERVAL_LENGTH, INTERVAL_MIDPOINT, OFFSET, PED_INTERVAL_VARS, STATUS,
    TEND, TSTART, interval_info,
};
use crate::summarize::summarize_columns;

/// Builds a prediction frame from `dataset`.
///
/// # Arguments
/// * `dataset`: the data the model was fitted on; needs at least 2 rows and
///   1 column.
/// * `assignments`: explicit values for some columns. The result holds one
///   row per combination of assigned values (per group, for grouped data).
pub fn make_newdata(
    dataset: &TabularDataset,
    assignments: &[Assignment],
) -> Result<DataFrame, ReshapeError> {
    info!(
        "Building new data for a {} dataset ({} rows, {} assignment(s))",
        dataset.kind().label(),
        dataset.nrows(),
        assignments.len()
    );
    let ndf = match dataset.kind() {
        DatasetKind::Default => build_default(dataset, assignments)?,
        DatasetKind::PersonPeriod(meta) => build_person_period(dataset, meta, assignments)?,
        DatasetKind::FunctionalPersonPeriod(meta) => {
            build_functional(dataset, meta, assignments)?
        }
    };
    info!("New data has {} rows and {} columns", ndf.height(), ndf.width());
    Ok(ndf)
}

fn validate_input(dataset: &TabularDataset) -> Result<(), ReshapeError> {
    let (rows, columns) = (dataset.nrows(), dataset.ncols());
    if rows < 2 || columns < 1 {
        return Err(ReshapeError::InvalidInput { rows, columns });
    }
    Ok(())
}

fn assigned_columns(assignments: &[Assignment]) -> Vec<String> {
    assignments
        .iter()
        .flat_map(Assignment::provided_columns)
        .collect()
}

fn build_default(
    dataset: &TabularDataset,
    assignments: &[Assignment],
) -> Result<DataFrame, ReshapeError> {
    // --- 1. Validate Inputs ---
    validate_input(dataset)?;
    let original = dataset.column_names();

    // --- 2. Evaluate Assignments ---
    let mut atomic = Vec::new();
    let mut aligned = Vec::new();
    for assignment in assignments {
        match evaluate(assignment, dataset.frame())? {
            Evaluated::Atomic(column) => atomic.push(column.into_frame()),
            Evaluated::Frame(frame) => aligned.push(frame),
        }
    }

    // --- 3. Factorial Grid Of Assigned Values ---
    let grid = combine_frames(&[combine_frames(&atomic)?, concat_columns(&aligned)?])?;
    let remaining: Vec<String> = original
        .iter()
        .filter(|name| !has_column(&grid, name))
        .cloned()
        .collect();

    // --- 4. Representative Values For Everything Else ---
    let ndf = if remaining.is_empty() {
        grid
    } else {
        let summary = summarize_columns(dataset, &remaining)?;
        debug!(
            "holding {} column(s) at representative values over a grid of {} row(s)",
            summary.width(),
            grid.height()
        );
        combine_frames(&[summary, grid])?
    };

    // --- 5. Restore The Original Schema ---
    let keep: Vec<String> = original
        .into_iter()
        .filter(|name| has_column(&ndf, name))
        .collect();
    Ok(ndf.select(keep)?)
}

fn build_person_period(
    dataset: &TabularDataset,
    meta: &PedMeta,
    assignments: &[Assignment],
) -> Result<DataFrame, ReshapeError> {
    // --- 1. Validate Inputs ---
    validate_input(dataset)?;
    let intervals = interval_info(&meta.breaks)?;
    let assigned = assigned_columns(assignments);

    // --- 2. Strip Unassigned Interval Columns ---
    let keep: Vec<String> = dataset
        .column_names()
        .into_iter()
        .filter(|name| !meta.is_interval_var(name) || assigned.contains(name))
        .collect();
    let stripped = dataset.with_frame(dataset.frame().select(keep)?);
    let ndf = build_default(&stripped, assignments)?;

    // --- 3. Re-attach Canonical Intervals ---
    let keys: Vec<String> = INTERVAL_COLUMNS
        .iter()
        .filter(|name| has_column(&ndf, name))
        .map(|name| name.to_string())
        .collect();
    let mut ndf = if keys.is_empty() {
        debug!("no interval column assigned; using the first interval");
        combine_frames(&[intervals.slice(0, 1), ndf])?
    } else {
        join_on(&intervals, &ndf, &keys)?
    };

    // --- 4. Recompute Derived Interval Columns ---
    let tstart = float_values(ndf.column(TSTART)?)?;
    let tend = float_values(ndf.column(TEND)?)?;
    let length: Vec<Option<f64>> = tstart
        .iter()
        .zip(&tend)
        .map(|(start, end)| Some((*end)? - (*start)?))
        .collect();
    if meta.is_interval_var(OFFSET) {
        let offset: Vec<Option<f64>> = length.iter().map(|l| l.map(f64::ln)).collect();
        ndf.with_column(Column::new(OFFSET.into(), offset))?;
    }
    if meta.is_interval_var(STATUS) {
        ndf.with_column(Column::new(STATUS.into(), vec![0i32; ndf.height()]))?;
    }
    ndf.with_column(Column::new(INTERVAL_LENGTH.into(), length))?;

    // --- 5. Order Columns: Intervals First ---
    let mut order: Vec<String> = PED_INTERVAL_VARS
        .iter()
        .filter(|name| has_column(&ndf, name))
        .map(|name| name.to_string())
        .collect();
    order.extend(
        dataset
            .column_names()
            .into_iter()
            .filter(|name| !PED_INTERVAL_VARS.contains(&name.as_str()) && has_column(&ndf, name)),
    );
    Ok(ndf.select(order)?)
}

fn build_functional(
    dataset: &TabularDataset,
    meta: &FunctionalMeta,
    assignments: &[Assignment],
) -> Result<DataFrame, ReshapeError> {
    // --- 1. Validate Inputs ---
    validate_input(dataset)?;
    let functional_names = meta.column_names();
    let (functional, scalar): (Vec<&Assignment>, Vec<&Assignment>) =
        assignments.iter().partition(|assignment| {
            assignment
                .provided_columns()
                .iter()
                .any(|name| functional_names.contains(name))
        });
    let assigned: Vec<String> = functional
        .iter()
        .flat_map(|assignment| assignment.provided_columns())
        .collect();
    // Scalar columns riding along with functional ones in a sub-frame.
    let riding: Vec<String> = assigned
        .iter()
        .filter(|name| !functional_names.contains(name))
        .cloned()
        .collect();
    if let Some(name) = riding
        .iter()
        .find(|name| meta.ped.is_interval_var(name) || INTERVAL_COLUMNS.contains(&name.as_str()))
    {
        return Err(ReshapeError::InvalidTransform(format!(
            "interval column '{name}' cannot be assigned together with functional columns"
        )));
    }

    // --- 2. Typical Exposure History For Unassigned Terms ---
    let cumu: Vec<_> = meta
        .columns
        .iter()
        .filter(|column| !assigned.contains(&column.name))
        .collect();
    let mut factors = vec![summarize_functional(&cumu, &meta.specs)?];

    // --- 3. Assigned Terms Over Their Flattened Values ---
    for assignment in functional {
        let source = match &assignment.value {
            AssignedValue::Transform { column, .. } => match meta.column(column) {
                Some(matrix) => {
                    Column::new(matrix.name.as_str().into(), matrix.flattened()).into_frame()
                }
                None => dataset.frame().clone(),
            },
            _ => DataFrame::empty(),
        };
        match evaluate(assignment, &source)? {
            Evaluated::Atomic(column) => factors.push(column.into_frame()),
            Evaluated::Frame(frame) => factors.push(frame),
        }
    }
    let functional_grid = combine_frames(&factors)?;

    // --- 4. Scalar Part As Person-Period Data ---
    let scalar: Vec<Assignment> = scalar.into_iter().cloned().collect();
    let keep: Vec<String> = dataset
        .column_names()
        .into_iter()
        .filter(|name| !riding.contains(name))
        .collect();
    let ped = dataset
        .with_frame(dataset.frame().select(keep)?)
        .with_kind(DatasetKind::PersonPeriod(meta.ped.clone()));
    let ndf = build_person_period(&ped, &meta.ped, &scalar)?;
    let combined = combine_frames(&[functional_grid, ndf])?;

    // --- 5. Order Columns And Refresh Lag-Lead Indicators ---
    let mut order: Vec<String> = PED_INTERVAL_VARS
        .iter()
        .filter(|name| **name != INTERVAL_MIDPOINT && has_column(&combined, name))
        .map(|name| name.to_string())
        .collect();
    order.extend(dataset.column_names().into_iter().filter(|name| {
        !PED_INTERVAL_VARS.contains(&name.as_str()) && has_column(&combined, name)
    }));
    order.extend(
        functional_names
            .iter()
            .filter(|name| has_column(&combined, name))
            .cloned(),
    );
    let ordered = combined.select(order)?;
    let ll_columns: Vec<String> = meta
        .columns
        .iter()
        .filter(|column| column.is_lag_lead())
        .map(|column| column.name.clone())
        .collect();
    adjust_lag_lead(&ordered, &ll_columns, &meta.specs)
}
