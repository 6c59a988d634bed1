use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors surfaced while summarizing, combining or building prediction frames.
#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error(
        "dataset must have at least 2 rows and 1 column to build new data (found {rows} rows, {columns} columns)"
    )]
    InvalidInput { rows: usize, columns: usize },
    #[error("column '{column}' of type {dtype} is not a tabular value column")]
    TypeMismatch { column: String, dtype: String },
    #[error("column '{0}' was not found in the dataset")]
    ColumnNotFound(String),
    #[error("column '{column}' must be numeric for this transform (found {dtype})")]
    NonNumericColumn { column: String, dtype: String },
    #[error("frames must be row-aligned: expected {expected} rows, found {found}")]
    MisalignedFrames { expected: usize, found: usize },
    #[error("invalid interval breaks: {0}")]
    InvalidBreaks(String),
    #[error("invalid transform: {0}")]
    InvalidTransform(String),
    #[error("Error from the underlying Polars library: {0}")]
    Polars(#[from] PolarsError),
}
