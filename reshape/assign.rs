//! Caller-specified values for prediction frames.
//!
//! An [`Assignment`] names an output column and says where its values come
//! from: a literal sequence, a [`Transform`] of an existing column
//! (`age = seq_range(age, 20)`), or a ready-made row-aligned frame.

use log::debug;
use polars::prelude::*;

use crate::error::ReshapeError;
use crate::frame_ops::{cell_keys, float_values, is_numeric, mode_row, to_index, CellKey};

/// A literal sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Float(Vec<f64>),
    Integer(Vec<i64>),
    Text(Vec<String>),
    Boolean(Vec<bool>),
}

impl Literal {
    pub fn len(&self) -> usize {
        match self {
            Literal::Float(values) => values.len(),
            Literal::Integer(values) => values.len(),
            Literal::Text(values) => values.len(),
            Literal::Boolean(values) => values.len(),
        }
    }

    /// An empty literal contributes no grid factor; its column falls back to
    /// the representative value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_column(&self, name: &str) -> Column {
        let name: PlSmallStr = name.into();
        match self {
            Literal::Float(values) => Column::new(name, values),
            Literal::Integer(values) => Column::new(name, values),
            Literal::Text(values) => Column::new(name, values),
            Literal::Boolean(values) => Column::new(name, values),
        }
    }
}

impl From<Vec<f64>> for Literal {
    fn from(values: Vec<f64>) -> Self {
        Literal::Float(values)
    }
}

impl From<Vec<i64>> for Literal {
    fn from(values: Vec<i64>) -> Self {
        Literal::Integer(values)
    }
}

impl From<Vec<String>> for Literal {
    fn from(values: Vec<String>) -> Self {
        Literal::Text(values)
    }
}

impl From<Vec<&str>> for Literal {
    fn from(values: Vec<&str>) -> Self {
        Literal::Text(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<bool>> for Literal {
    fn from(values: Vec<bool>) -> Self {
        Literal::Boolean(values)
    }
}

/// Functions of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Mean,
    Median,
    Min,
    Max,
    /// Most frequent value; any column type.
    Mode,
    /// First value; any column type.
    First,
    /// Distinct non-null values in order of appearance; any column type.
    Unique,
    /// `n` equally spaced values from the minimum to the maximum.
    SeqRange(usize),
    Quantiles(Vec<f64>),
}

impl Transform {
    fn requires_numeric(&self) -> bool {
        !matches!(self, Transform::Mode | Transform::First | Transform::Unique)
    }
}

#[derive(Debug, Clone)]
pub enum AssignedValue {
    Values(Literal),
    Transform { column: String, transform: Transform },
    Frame(DataFrame),
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: String,
    pub value: AssignedValue,
}

impl Assignment {
    pub fn values(target: impl Into<String>, values: impl Into<Literal>) -> Self {
        Self {
            target: target.into(),
            value: AssignedValue::Values(values.into()),
        }
    }

    pub fn transform(
        target: impl Into<String>,
        column: impl Into<String>,
        transform: Transform,
    ) -> Self {
        Self {
            target: target.into(),
            value: AssignedValue::Transform {
                column: column.into(),
                transform,
            },
        }
    }

    /// `column = transform(column)`.
    pub fn of_column(column: impl Into<String>, transform: Transform) -> Self {
        let column = column.into();
        Self::transform(column.clone(), column, transform)
    }

    pub fn frame(target: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            target: target.into(),
            value: AssignedValue::Frame(frame),
        }
    }

    /// Output columns this assignment provides.
    pub fn provided_columns(&self) -> Vec<String> {
        match &self.value {
            AssignedValue::Frame(frame) => crate::frame_ops::column_names(frame),
            _ => vec![self.target.clone()],
        }
    }
}

/// Result of evaluating one assignment.
#[derive(Debug, Clone)]
pub enum Evaluated {
    Atomic(Column),
    Frame(DataFrame),
}

pub fn evaluate(assignment: &Assignment, frame: &DataFrame) -> Result<Evaluated, ReshapeError> {
    match &assignment.value {
        AssignedValue::Values(literal) => {
            if literal.is_empty() {
                debug!(
                    "assignment to '{}' has no values; it is left out of the grid",
                    assignment.target
                );
            } else {
                debug!(
                    "assignment to '{}' supplies {} value(s)",
                    assignment.target,
                    literal.len()
                );
            }
            Ok(Evaluated::Atomic(literal.to_column(&assignment.target)))
        }
        AssignedValue::Transform { column, transform } => {
            let source = frame
                .column(column)
                .map_err(|_| ReshapeError::ColumnNotFound(column.clone()))?;
            Ok(Evaluated::Atomic(apply_transform(
                source,
                transform,
                &assignment.target,
            )?))
        }
        AssignedValue::Frame(sub) => Ok(Evaluated::Frame(sub.clone())),
    }
}

/// Applies `transform` to `source`, naming the result `target`.
pub fn apply_transform(
    source: &Column,
    transform: &Transform,
    target: &str,
) -> Result<Column, ReshapeError> {
    let name: PlSmallStr = target.into();
    if transform.requires_numeric() && !is_numeric(source.dtype()) {
        return Err(ReshapeError::NonNumericColumn {
            column: source.name().to_string(),
            dtype: source.dtype().to_string(),
        });
    }
    let column = match transform {
        Transform::Mode => {
            let keys = cell_keys(source)?;
            let rows: Vec<IdxSize> = (0..source.len() as IdxSize).collect();
            let picked: Vec<IdxSize> = mode_row(&keys, &rows).into_iter().collect();
            source.take(&to_index(&picked))?
        }
        Transform::First => source.slice(0, 1),
        Transform::Unique => {
            let keys = cell_keys(source)?;
            let mut seen = ahash::AHashSet::new();
            let firsts: Vec<IdxSize> = keys
                .iter()
                .enumerate()
                .filter(|(_, key)| **key != CellKey::Null && seen.insert(*key))
                .map(|(row, _)| row as IdxSize)
                .collect();
            source.take(&to_index(&firsts))?
        }
        numeric => {
            let mut values: Vec<f64> = float_values(source)?.into_iter().flatten().collect();
            values.sort_by(f64::total_cmp);
            Column::new(name.clone(), numeric_summary(&values, numeric)?)
        }
    };
    Ok(column.with_name(name))
}

fn numeric_summary(sorted: &[f64], transform: &Transform) -> Result<Vec<f64>, ReshapeError> {
    if sorted.is_empty() {
        return Err(ReshapeError::InvalidTransform(format!(
            "{transform:?} needs at least one non-missing value"
        )));
    }
    let n = sorted.len();
    Ok(match transform {
        Transform::Mean => vec![sorted.iter().sum::<f64>() / n as f64],
        Transform::Median => vec![quantile(sorted, 0.5)],
        Transform::Min => vec![sorted[0]],
        Transform::Max => vec![sorted[n - 1]],
        Transform::SeqRange(points) => seq_range(sorted[0], sorted[n - 1], *points)?,
        Transform::Quantiles(probs) => {
            if let Some(p) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                return Err(ReshapeError::InvalidTransform(format!(
                    "quantile probability {p} is outside [0, 1]"
                )));
            }
            probs.iter().map(|&p| quantile(sorted, p)).collect()
        }
        Transform::Mode | Transform::First | Transform::Unique => {
            return Err(ReshapeError::InvalidTransform(format!(
                "{transform:?} is not a numeric summary"
            )));
        }
    })
}

/// Linearly interpolated quantile of sorted values.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// `n` equally spaced values from `min` to `max`.
pub fn seq_range(min: f64, max: f64, n: usize) -> Result<Vec<f64>, ReshapeError> {
    match n {
        0 => Err(ReshapeError::InvalidTransform(
            "seq_range needs at least one point".to_string(),
        )),
        1 => Ok(vec![min]),
        _ => {
            let step = (max - min) / (n - 1) as f64;
            Ok((0..n)
                .map(|i| if i == n - 1 { max } else { min + step * i as f64 })
                .collect())
        }
    }
}
