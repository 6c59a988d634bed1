//! Row-wise combination of frames: full cross products, straight column
//! concatenation and explicit keyed joins.

use ahash::AHashMap;
use itertools::Itertools;
use log::debug;
use polars::prelude::*;

use crate::error::ReshapeError;
use crate::frame_ops::{has_column, is_tabular, row_keys, take_rows};

/// Cross product of the rows of all frames.
///
/// The first frame's rows vary fastest and the last frame's rows slowest.
/// Zero-row frames are left out entirely, so combining with an empty frame is
/// the identity. If no frame has rows the result is an empty frame. A column
/// name occurring in several frames keeps the position of its first
/// occurrence and the values of its last one.
///
/// # Arguments
/// * `frames`: the frames to combine; every column must hold numeric,
///   string, categorical or boolean values.
pub fn combine_frames(frames: &[DataFrame]) -> Result<DataFrame, ReshapeError> {
    for frame in frames {
        ensure_tabular(frame)?;
    }
    let included: Vec<&DataFrame> = frames.iter().filter(|f| f.height() > 0).collect();
    if included.is_empty() {
        debug!(
            "combining {} frame(s) without rows; result is empty",
            frames.len()
        );
        return Ok(DataFrame::empty());
    }

    // The last iterator of a multi-cartesian product varies fastest, so the
    // frames are fed in reverse.
    let tuples: Vec<Vec<usize>> = included
        .iter()
        .rev()
        .map(|frame| 0..frame.height())
        .multi_cartesian_product()
        .collect();
    let last = included.len() - 1;

    let mut columns: Vec<Column> = Vec::new();
    for (position, frame) in included.iter().enumerate() {
        let rows: Vec<IdxSize> = tuples
            .iter()
            .map(|tuple| tuple[last - position] as IdxSize)
            .collect();
        for column in take_rows(frame, &rows)?.take_columns() {
            push_last_wins(&mut columns, column);
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Horizontal concatenation of row-aligned frames. Zero-row frames are
/// skipped.
pub fn concat_columns(frames: &[DataFrame]) -> Result<DataFrame, ReshapeError> {
    let mut columns: Vec<Column> = Vec::new();
    let mut height: Option<usize> = None;
    for frame in frames.iter().filter(|f| f.height() > 0) {
        ensure_tabular(frame)?;
        let expected = *height.get_or_insert(frame.height());
        if frame.height() != expected {
            return Err(ReshapeError::MisalignedFrames {
                expected,
                found: frame.height(),
            });
        }
        for column in frame.get_columns() {
            push_last_wins(&mut columns, column.clone());
        }
    }
    if columns.is_empty() {
        return Ok(DataFrame::empty());
    }
    Ok(DataFrame::new(columns)?)
}

/// Joins `left` onto `right` on explicit key columns.
///
/// Produces one row for every pair of a `right` row and a `left` row with
/// equal keys, in `right` row order. Rows of `right` without a partner are
/// dropped. The output holds all `left` columns (including the keys, with
/// `left`'s types) followed by the non-key columns of `right`. Numeric keys
/// are compared as `f64`.
pub fn join_on(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[String],
) -> Result<DataFrame, ReshapeError> {
    for key in keys {
        if !has_column(left, key) || !has_column(right, key) {
            return Err(ReshapeError::ColumnNotFound(key.clone()));
        }
    }
    let mut lookup: AHashMap<_, Vec<IdxSize>> = AHashMap::new();
    for (row, key) in row_keys(left, keys)?.into_iter().enumerate() {
        lookup.entry(key).or_default().push(row as IdxSize);
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    let mut unmatched = 0usize;
    for (row, key) in row_keys(right, keys)?.into_iter().enumerate() {
        match lookup.get(&key) {
            Some(matches) => {
                for &left_row in matches {
                    left_rows.push(left_row);
                    right_rows.push(row as IdxSize);
                }
            }
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!("join on {keys:?} dropped {unmatched} unmatched row(s)");
    }

    let mut columns = take_rows(left, &left_rows)?.take_columns();
    for column in take_rows(right, &right_rows)?.take_columns() {
        if keys.iter().any(|key| key.as_str() == column.name().as_str()) {
            continue;
        }
        push_last_wins(&mut columns, column);
    }
    Ok(DataFrame::new(columns)?)
}

fn ensure_tabular(frame: &DataFrame) -> Result<(), ReshapeError> {
    match frame.get_columns().iter().find(|c| !is_tabular(c.dtype())) {
        Some(column) => Err(ReshapeError::TypeMismatch {
            column: column.name().to_string(),
            dtype: column.dtype().to_string(),
        }),
        None => Ok(()),
    }
}

fn push_last_wins(columns: &mut Vec<Column>, column: Column) {
    match columns.iter_mut().find(|c| c.name() == column.name()) {
        Some(slot) => *slot = column,
        None => columns.push(column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_ops::{column_names, float_values};

    fn numbers(frame: &DataFrame, name: &str) -> Vec<f64> {
        float_values(frame.column(name).unwrap())
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    fn frame_a() -> DataFrame {
        DataFrame::new(vec![
            Column::new("a".into(), [1.0, 2.0, 3.0]),
            Column::new("label".into(), ["x", "y", "z"]),
        ])
        .unwrap()
    }

    fn frame_b() -> DataFrame {
        DataFrame::new(vec![Column::new("b".into(), [10i32, 20])]).unwrap()
    }

    #[test]
    fn cross_product_has_first_frame_varying_fastest() {
        let combined = combine_frames(&[frame_a(), frame_b()]).unwrap();
        assert_eq!(combined.shape(), (6, 3));
        assert_eq!(column_names(&combined), vec!["a", "label", "b"]);
        assert_eq!(numbers(&combined, "a"), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(
            numbers(&combined, "b"),
            vec![10.0, 10.0, 10.0, 20.0, 20.0, 20.0]
        );
    }

    #[test]
    fn three_frames_nest_like_loops() {
        let c = DataFrame::new(vec![Column::new("c".into(), [true, false])]).unwrap();
        let combined = combine_frames(&[frame_b(), c, frame_a()]).unwrap();
        assert_eq!(combined.height(), 12);
        assert_eq!(numbers(&combined, "b")[..4], [10.0, 20.0, 10.0, 20.0]);
        let flags: Vec<bool> = combined
            .column("c")
            .unwrap()
            .bool()
            .unwrap()
            .into_no_null_iter()
            .take(4)
            .collect();
        assert_eq!(flags, vec![true, true, false, false]);
        assert_eq!(numbers(&combined, "a")[..5], [1.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn zero_row_frames_are_omitted() {
        let empty = DataFrame::new(vec![Column::new_empty("gone".into(), &DataType::Float64)])
            .unwrap();
        let combined = combine_frames(&[frame_a(), empty.clone()]).unwrap();
        assert_eq!(combined.shape(), (3, 2));
        assert!(!has_column(&combined, "gone"));

        let nothing = combine_frames(&[empty.clone(), empty]).unwrap();
        assert_eq!(nothing.shape(), (0, 0));
        assert_eq!(combine_frames(&[]).unwrap().shape(), (0, 0));
    }

    #[test]
    fn colliding_names_keep_last_values() {
        let other = DataFrame::new(vec![Column::new("a".into(), [7.0])]).unwrap();
        let combined = combine_frames(&[frame_a(), other]).unwrap();
        assert_eq!(column_names(&combined), vec!["a", "label"]);
        assert_eq!(numbers(&combined, "a"), vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn nested_columns_are_rejected() {
        let inner = Series::new("v".into(), [1.0, 2.0]);
        let list = Column::new("nested".into(), [inner.clone(), inner]);
        let frame = DataFrame::new(vec![list]).unwrap();
        let err = combine_frames(&[frame]).unwrap_err();
        assert!(matches!(err, ReshapeError::TypeMismatch { column, .. } if column == "nested"));
    }

    #[test]
    fn concat_requires_aligned_rows() {
        let aligned = DataFrame::new(vec![Column::new("c".into(), ["p", "q", "r"])]).unwrap();
        let joined = concat_columns(&[frame_a(), aligned]).unwrap();
        assert_eq!(joined.shape(), (3, 3));
        let err = concat_columns(&[frame_a(), frame_b()]).unwrap_err();
        assert!(matches!(
            err,
            ReshapeError::MisalignedFrames {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn join_drops_unmatched_rows_and_follows_right_order() {
        let left = DataFrame::new(vec![
            Column::new("tend".into(), [500.0, 1000.0]),
            Column::new("tstart".into(), [0.0, 500.0]),
        ])
        .unwrap();
        let right = DataFrame::new(vec![
            Column::new("tend".into(), [1000i32, 750, 500]),
            Column::new("age".into(), [50.0, 55.0, 60.0]),
        ])
        .unwrap();
        let joined = join_on(&left, &right, &["tend".to_string()]).unwrap();
        assert_eq!(column_names(&joined), vec!["tend", "tstart", "age"]);
        assert_eq!(numbers(&joined, "tend"), vec![1000.0, 500.0]);
        assert_eq!(numbers(&joined, "tstart"), vec![500.0, 0.0]);
        assert_eq!(numbers(&joined, "age"), vec![50.0, 60.0]);
        assert_eq!(joined.column("tend").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn join_requires_keys_on_both_sides() {
        let err = join_on(&frame_a(), &frame_b(), &["a".to_string()]).unwrap_err();
        assert!(matches!(err, ReshapeError::ColumnNotFound(name) if name == "a"));
    }
}
