//! Representative values of a dataset: the mean of every numeric column and
//! the mode of every other column, per group.

use log::debug;
use polars::prelude::*;

use crate::dataset::TabularDataset;
use crate::error::ReshapeError;
use crate::frame_ops::{
    cell_keys, column_names, float_values, group_rows, has_column, is_numeric, mode_row,
    take_rows, to_index,
};

/// Summarizes every column of the dataset.
///
/// Person-period data is first reduced to one row per subject and stripped
/// of its interval bookkeeping. The result has one row per group (one row if
/// ungrouped) in order of first appearance, with the original column order.
/// When nothing is left to summarize the result is an empty frame.
pub fn summarize(dataset: &TabularDataset) -> Result<DataFrame, ReshapeError> {
    summarize_columns(dataset, &dataset.column_names())
}

/// Like [`summarize`], restricted to `columns`. Grouping columns outside
/// `columns` are not grouped on.
pub fn summarize_columns(
    dataset: &TabularDataset,
    columns: &[String],
) -> Result<DataFrame, ReshapeError> {
    let (frame, excluded) = match dataset.kind().ped_meta() {
        None => (dataset.frame().clone(), Vec::new()),
        Some(meta) => (
            first_row_per_subject(dataset.frame(), &meta.id_var)?,
            meta.interval_vars.clone(),
        ),
    };
    let wanted = |name: &String| columns.contains(name) && !excluded.contains(name);
    let groups: Vec<String> = dataset
        .groups()
        .iter()
        .filter(|g| wanted(*g))
        .cloned()
        .collect();
    let keep: Vec<String> = column_names(&frame)
        .into_iter()
        .filter(|name| wanted(name))
        .collect();
    if keep.is_empty() {
        debug!("no columns left to summarize; returning an empty summary");
        return Ok(DataFrame::empty());
    }
    reduce(&frame.select(keep)?, &groups)
}

/// First row of every subject, subjects in order of first appearance.
pub fn first_row_per_subject(frame: &DataFrame, id_var: &str) -> Result<DataFrame, ReshapeError> {
    if !has_column(frame, id_var) {
        return Ok(frame.clone());
    }
    let firsts: Vec<IdxSize> = group_rows(frame, &[id_var.to_string()])?
        .iter()
        .map(|rows| rows[0])
        .collect();
    Ok(take_rows(frame, &firsts)?)
}

/// Mean/mode reduction of every non-grouping column, per group.
pub fn reduce(frame: &DataFrame, groups: &[String]) -> Result<DataFrame, ReshapeError> {
    let partitions = group_rows(frame, groups)?;
    let mut reduced = Vec::with_capacity(frame.width());
    for column in frame.get_columns() {
        let name = column.name();
        if groups.iter().any(|g| g.as_str() == name.as_str()) {
            let firsts: Vec<IdxSize> = partitions.iter().map(|rows| rows[0]).collect();
            reduced.push(column.take(&to_index(&firsts))?);
        } else if is_numeric(column.dtype()) {
            let values = float_values(column)?;
            let means: Vec<Option<f64>> = partitions
                .iter()
                .map(|rows| mean_of(&values, rows))
                .collect();
            reduced.push(Column::new(name.clone(), means));
        } else {
            let keys = cell_keys(column)?;
            let modes: Vec<IdxSize> = partitions
                .iter()
                .filter_map(|rows| mode_row(&keys, rows))
                .collect();
            reduced.push(column.take(&to_index(&modes))?);
        }
    }
    Ok(DataFrame::new(reduced)?)
}

fn mean_of(values: &[Option<f64>], rows: &[IdxSize]) -> Option<f64> {
    let (sum, count) = rows
        .iter()
        .filter_map(|&row| values[row as usize])
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
