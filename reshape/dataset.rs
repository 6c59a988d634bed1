//! # Dataset Model
//!
//! A [`TabularDataset`] is a `polars` frame plus two pieces of metadata the
//! frame itself cannot carry: an optional grouping key and a [`DatasetKind`]
//! tag. The tag distinguishes plain tables from person-period data (split at
//! interval `breaks`) and from person-period data with matrix-valued
//! cumulative effect columns. Every operation of this crate dispatches on the
//! tag explicitly; the set of kinds is closed.
//!
//! Person-period metadata is produced upstream by whatever routine split the
//! raw survival records. It is taken as given here, apart from validation of
//! the cut points and of the shapes of functional matrices.

use polars::prelude::*;

use crate::error::ReshapeError;
use crate::frame_ops::{column_names, has_column};
use crate::functional::{FuncSpec, FunctionalColumn};
use crate::intervals::{PED_INTERVAL_VARS, validate_breaks};

/// Metadata of person-period data.
#[derive(Debug, Clone, PartialEq)]
pub struct PedMeta {
    pub id_var: String,
    pub interval_vars: Vec<String>,
    pub breaks: Vec<f64>,
}

impl PedMeta {
    /// Person-period metadata carrying every interval bookkeeping column.
    pub fn new(id_var: impl Into<String>, breaks: Vec<f64>) -> Result<Self, ReshapeError> {
        validate_breaks(&breaks)?;
        Ok(Self {
            id_var: id_var.into(),
            interval_vars: PED_INTERVAL_VARS.iter().map(|v| v.to_string()).collect(),
            breaks,
        })
    }

    /// Restricts the bookkeeping columns to those the dataset actually has.
    pub fn with_interval_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interval_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_interval_var(&self, name: &str) -> bool {
        self.interval_vars.iter().any(|v| v == name)
    }
}

/// Person-period metadata together with cumulative effect terms.
#[derive(Debug, Clone)]
pub struct FunctionalMeta {
    pub ped: PedMeta,
    pub columns: Vec<FunctionalColumn>,
    pub specs: Vec<FuncSpec>,
}

impl FunctionalMeta {
    pub fn column(&self, name: &str) -> Option<&FunctionalColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum DatasetKind {
    Default,
    PersonPeriod(PedMeta),
    FunctionalPersonPeriod(FunctionalMeta),
}

impl DatasetKind {
    pub fn ped_meta(&self) -> Option<&PedMeta> {
        match self {
            DatasetKind::Default => None,
            DatasetKind::PersonPeriod(meta) => Some(meta),
            DatasetKind::FunctionalPersonPeriod(meta) => Some(&meta.ped),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Default => "default",
            DatasetKind::PersonPeriod(_) => "person-period",
            DatasetKind::FunctionalPersonPeriod(_) => "functional person-period",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TabularDataset {
    frame: DataFrame,
    groups: Vec<String>,
    kind: DatasetKind,
}

impl TabularDataset {
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            groups: Vec::new(),
            kind: DatasetKind::Default,
        }
    }

    pub fn person_period(frame: DataFrame, meta: PedMeta) -> Result<Self, ReshapeError> {
        validate_ped(&frame, &meta)?;
        Ok(Self {
            frame,
            groups: Vec::new(),
            kind: DatasetKind::PersonPeriod(meta),
        })
    }

    /// Person-period data with matrix-valued columns. Every matrix needs one
    /// row per frame row.
    pub fn functional(
        frame: DataFrame,
        meta: PedMeta,
        columns: Vec<FunctionalColumn>,
        specs: Vec<FuncSpec>,
    ) -> Result<Self, ReshapeError> {
        validate_ped(&frame, &meta)?;
        let height = frame.height();
        if let Some(column) = columns.iter().find(|c| c.values.nrows() != height) {
            return Err(ReshapeError::MisalignedFrames {
                expected: height,
                found: column.values.nrows(),
            });
        }
        Ok(Self {
            frame,
            groups: Vec::new(),
            kind: DatasetKind::FunctionalPersonPeriod(FunctionalMeta {
                ped: meta,
                columns,
                specs,
            }),
        })
    }

    /// Groups rows by the given columns for per-group summaries.
    pub fn group_by<I, S>(mut self, columns: I) -> Result<Self, ReshapeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: Vec<String> = columns.into_iter().map(Into::into).collect();
        if let Some(missing) = groups.iter().find(|g| !has_column(&self.frame, g)) {
            return Err(ReshapeError::ColumnNotFound(missing.clone()));
        }
        self.groups = groups;
        Ok(self)
    }

    pub fn ungroup(mut self) -> Self {
        self.groups.clear();
        self
    }

    /// Same kind and grouping over another frame. Grouping columns the frame
    /// lacks are dropped from the key.
    pub fn with_frame(&self, frame: DataFrame) -> Self {
        let groups = self
            .groups
            .iter()
            .filter(|g| has_column(&frame, g))
            .cloned()
            .collect();
        Self {
            frame,
            groups,
            kind: self.kind.clone(),
        }
    }

    pub(crate) fn with_kind(&self, kind: DatasetKind) -> Self {
        Self {
            frame: self.frame.clone(),
            groups: self.groups.clone(),
            kind,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_grouped(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn kind(&self) -> &DatasetKind {
        &self.kind
    }

    pub fn column_names(&self) -> Vec<String> {
        column_names(&self.frame)
    }

    pub fn nrows(&self) -> usize {
        self.frame.height()
    }

    pub fn ncols(&self) -> usize {
        self.frame.width()
    }
}

fn validate_ped(frame: &DataFrame, meta: &PedMeta) -> Result<(), ReshapeError> {
    validate_breaks(&meta.breaks)?;
    if !has_column(frame, &meta.id_var) {
        return Err(ReshapeError::ColumnNotFound(meta.id_var.clone()));
    }
    Ok(())
}
