#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
//! Prediction frames for tabular and person-period survival data.
//!
//! The three building blocks are [`summarize`] (representative values per
//! group), [`combine_frames`] (row cross products) and [`make_newdata`]
//! (factorial prediction grids with everything else held fixed).

pub mod assign;
pub mod combine;
pub mod config;
pub mod dataset;
pub mod error;
#[path = "../shared/frame_ops.rs"]
pub mod frame_ops;
pub mod functional;
pub mod intervals;
pub mod newdata;
pub mod summarize;

pub use assign::{AssignedValue, Assignment, Literal, Transform, seq_range};
pub use combine::{combine_frames, concat_columns, join_on};
pub use config::{ConfigError, NewdataRequest};
pub use dataset::{DatasetKind, FunctionalMeta, PedMeta, TabularDataset};
pub use error::ReshapeError;
pub use functional::{FuncSpec, FunctionalColumn, LagLead};
pub use intervals::{get_intervals, interval_info, interval_labels};
pub use newdata::make_newdata;
pub use summarize::{summarize, summarize_columns};
