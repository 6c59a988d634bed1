//! Canonical interval bookkeeping derived from a set of cut points.
//!
//! Person-period data split follow-up time at `breaks`. Every row of such a
//! dataset belongs to one interval, whose start, end, length and midpoint are
//! fully determined by the cut points. Prediction frames rebuild these columns
//! from here rather than from whatever rows happened to be sampled.

use log::debug;
use polars::prelude::*;

use crate::error::ReshapeError;
use crate::frame_ops::take_rows;

pub const TSTART: &str = "tstart";
pub const TEND: &str = "tend";
pub const INTERVAL_LENGTH: &str = "interval_length";
pub const INTERVAL_MIDPOINT: &str = "interval_midpoint";
pub const OFFSET: &str = "offset";
pub const STATUS: &str = "status_in_interval";

/// Columns of the canonical interval frame, in order.
pub const INTERVAL_COLUMNS: [&str; 4] = [TSTART, TEND, INTERVAL_LENGTH, INTERVAL_MIDPOINT];

/// All interval bookkeeping columns a person-period dataset may carry, in
/// canonical output order.
pub const PED_INTERVAL_VARS: [&str; 6] = [
    TSTART,
    TEND,
    INTERVAL_LENGTH,
    INTERVAL_MIDPOINT,
    OFFSET,
    STATUS,
];

pub fn validate_breaks(breaks: &[f64]) -> Result<(), ReshapeError> {
    if breaks.len() < 2 {
        return Err(ReshapeError::InvalidBreaks(format!(
            "at least two cut points are required, found {}",
            breaks.len()
        )));
    }
    if breaks.iter().any(|b| !b.is_finite()) {
        return Err(ReshapeError::InvalidBreaks(
            "cut points must be finite".to_string(),
        ));
    }
    if breaks.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(ReshapeError::InvalidBreaks(
            "cut points must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// One row per interval with `tstart`, `tend`, `interval_length` and
/// `interval_midpoint`.
pub fn interval_info(breaks: &[f64]) -> Result<DataFrame, ReshapeError> {
    validate_breaks(breaks)?;
    let tstart: Vec<f64> = breaks[..breaks.len() - 1].to_vec();
    let tend: Vec<f64> = breaks[1..].to_vec();
    let length: Vec<f64> = tstart.iter().zip(&tend).map(|(a, b)| b - a).collect();
    let midpoint: Vec<f64> = tstart
        .iter()
        .zip(&tend)
        .map(|(a, b)| 0.5 * (a + b))
        .collect();
    Ok(DataFrame::new(vec![
        Column::new(TSTART.into(), tstart),
        Column::new(TEND.into(), tend),
        Column::new(INTERVAL_LENGTH.into(), length),
        Column::new(INTERVAL_MIDPOINT.into(), midpoint),
    ])?)
}

/// Human-readable `(tstart,tend]` label for every interval.
pub fn interval_labels(breaks: &[f64]) -> Result<Vec<String>, ReshapeError> {
    validate_breaks(breaks)?;
    Ok(breaks
        .windows(2)
        .map(|pair| format!("({},{}]", pair[0], pair[1]))
        .collect())
}

/// Index of the interval containing `time`. Intervals are `(tstart, tend]`,
/// except that the first cut point belongs to the first interval.
fn locate(breaks: &[f64], time: f64) -> Option<usize> {
    let upper = breaks.partition_point(|&b| b < time);
    match upper {
        0 if time == breaks[0] => Some(0),
        0 => None,
        j if j == breaks.len() => None,
        j => Some(j - 1),
    }
}

/// Interval information for arbitrary follow-up times.
///
/// Returns a frame with a leading `t` column followed by the canonical
/// interval columns of the interval each time falls into. Times outside the
/// range of `breaks` are skipped.
pub fn get_intervals(breaks: &[f64], times: &[f64]) -> Result<DataFrame, ReshapeError> {
    let info = interval_info(breaks)?;
    let mut kept_times = Vec::with_capacity(times.len());
    let mut rows = Vec::with_capacity(times.len());
    for &time in times {
        match locate(breaks, time) {
            Some(row) => {
                kept_times.push(time);
                rows.push(row as IdxSize);
            }
            None => debug!("time {time} lies outside the interval breaks; skipped"),
        }
    }
    let selected = take_rows(&info, &rows)?;
    let mut columns = vec![Column::new("t".into(), kept_times)];
    columns.extend(selected.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn floats(frame: &DataFrame, name: &str) -> Vec<f64> {
        frame
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn interval_info_matches_breaks() {
        let info = interval_info(&[0.0, 500.0, 1000.0, 1500.0]).unwrap();
        assert_eq!(info.height(), 3);
        assert_eq!(floats(&info, TSTART), vec![0.0, 500.0, 1000.0]);
        assert_eq!(floats(&info, TEND), vec![500.0, 1000.0, 1500.0]);
        assert_eq!(floats(&info, INTERVAL_LENGTH), vec![500.0; 3]);
        assert_abs_diff_eq!(floats(&info, INTERVAL_MIDPOINT)[2], 1250.0);
    }

    #[test]
    fn rejects_unsorted_or_short_breaks() {
        assert!(matches!(
            interval_info(&[0.0]),
            Err(ReshapeError::InvalidBreaks(_))
        ));
        assert!(matches!(
            interval_info(&[0.0, 10.0, 10.0]),
            Err(ReshapeError::InvalidBreaks(_))
        ));
        assert!(matches!(
            interval_info(&[0.0, f64::NAN]),
            Err(ReshapeError::InvalidBreaks(_))
        ));
    }

    #[test]
    fn labels_are_left_open() {
        let labels = interval_labels(&[0.0, 0.5, 2.0]).unwrap();
        assert_eq!(labels, vec!["(0,0.5]".to_string(), "(0.5,2]".to_string()]);
    }

    #[test]
    fn get_intervals_snaps_times_and_skips_outliers() {
        let frame = get_intervals(&[0.0, 500.0, 1000.0], &[0.0, 500.0, 501.0, 1200.0]).unwrap();
        assert_eq!(frame.height(), 3);
        assert_eq!(floats(&frame, "t"), vec![0.0, 500.0, 501.0]);
        assert_eq!(floats(&frame, TEND), vec![500.0, 500.0, 1000.0]);
    }
}
