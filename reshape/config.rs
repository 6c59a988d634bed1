//! TOML description of a prediction-frame request.
//!
//! ```toml
//! [person_period]
//! id_var = "id"
//! breaks = [0.0, 500.0, 1000.0]
//!
//! [[assign]]
//! target = "age"
//! values = [50.0, 55.0]
//!
//! [[assign]]
//! target = "age"
//! transform = "seq_range"
//! n = 20
//! ```

use std::fs;
use std::io::{BufWriter, Write};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assign::{Assignment, Literal, Transform};
use crate::dataset::{PedMeta, TabularDataset};
use crate::error::ReshapeError;
use crate::functional::{FuncSpec, FunctionalColumn, LagLead};
use crate::newdata::make_newdata;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write request file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML request: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize request to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Reshape(#[from] ReshapeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Mean,
    Median,
    Min,
    Max,
    Mode,
    First,
    Unique,
    SeqRange,
    Quantiles,
}

/// One `[[assign]]` table. Exactly one value source must be given: `values`,
/// `integers`, `labels`, `flags` or `transform` (applied to `column`, which
/// defaults to `target`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConfig {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integers: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probs: Option<Vec<f64>>,
}

impl AssignmentConfig {
    pub fn to_assignment(&self) -> Result<Assignment, ConfigError> {
        let literals: Vec<Literal> = [
            self.values.clone().map(Literal::from),
            self.integers.clone().map(Literal::from),
            self.labels.clone().map(Literal::from),
            self.flags.clone().map(Literal::from),
        ]
        .into_iter()
        .flatten()
        .collect();
        let sources = literals.len() + usize::from(self.transform.is_some());
        if sources != 1 {
            return Err(ConfigError::Invalid(format!(
                "assignment to '{}' must give exactly one value source, found {sources}",
                self.target
            )));
        }
        if let Some(literal) = literals.into_iter().next() {
            return Ok(Assignment::values(self.target.clone(), literal));
        }
        let kind = self.transform.ok_or_else(|| {
            ConfigError::Invalid(format!("assignment to '{}' has no transform", self.target))
        })?;
        let transform = match kind {
            TransformKind::Mean => Transform::Mean,
            TransformKind::Median => Transform::Median,
            TransformKind::Min => Transform::Min,
            TransformKind::Max => Transform::Max,
            TransformKind::Mode => Transform::Mode,
            TransformKind::First => Transform::First,
            TransformKind::Unique => Transform::Unique,
            TransformKind::SeqRange => Transform::SeqRange(self.n.ok_or_else(|| {
                ConfigError::Invalid(format!("seq_range for '{}' needs `n`", self.target))
            })?),
            TransformKind::Quantiles => Transform::Quantiles(self.probs.clone().ok_or_else(
                || ConfigError::Invalid(format!("quantiles for '{}' need `probs`", self.target)),
            )?),
        };
        let column = self.column.clone().unwrap_or_else(|| self.target.clone());
        Ok(Assignment::transform(self.target.clone(), column, transform))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonPeriodConfig {
    pub id_var: String,
    pub breaks: Vec<f64>,
    /// Interval bookkeeping columns the data carries; all of them if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_vars: Option<Vec<String>>,
}

impl PersonPeriodConfig {
    pub fn to_meta(&self) -> Result<PedMeta, ReshapeError> {
        let meta = PedMeta::new(self.id_var.clone(), self.breaks.clone())?;
        Ok(match &self.interval_vars {
            Some(vars) => meta.with_interval_vars(vars.iter().cloned()),
            None => meta,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LagLeadConfig {
    #[default]
    Onset,
    Window {
        lag: f64,
        lead: f64,
    },
}

impl From<LagLeadConfig> for LagLead {
    fn from(config: LagLeadConfig) -> Self {
        match config {
            LagLeadConfig::Onset => LagLead::Onset,
            LagLeadConfig::Window { lag, lead } => LagLead::Window { lag, lead },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncSpecConfig {
    pub z_var: String,
    pub tz_var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default)]
    pub lag_lead: LagLeadConfig,
}

impl FuncSpecConfig {
    pub fn to_spec(&self) -> FuncSpec {
        let mut spec = FuncSpec::new(self.z_var.clone(), self.tz_var.clone())
            .with_lag_lead(self.lag_lead.into());
        if let Some(latency) = &self.latency_var {
            spec = spec.with_latency(latency.clone());
        }
        if let Some(suffix) = &self.suffix {
            spec = spec.with_suffix(suffix.clone());
        }
        spec
    }
}

/// A complete request: what kind of data is supplied and which columns to
/// vary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewdataRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_period: Option<PersonPeriodConfig>,
    #[serde(default, rename = "func_spec", skip_serializing_if = "Vec::is_empty")]
    pub func_specs: Vec<FuncSpecConfig>,
    #[serde(default, rename = "assign")]
    pub assignments: Vec<AssignmentConfig>,
}

impl NewdataRequest {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_string)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = self.to_toml_string()?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn assignments(&self) -> Result<Vec<Assignment>, ConfigError> {
        self.assignments
            .iter()
            .map(AssignmentConfig::to_assignment)
            .collect()
    }

    /// Tags `frame` as plain or person-period data, per the request.
    pub fn dataset(&self, frame: DataFrame) -> Result<TabularDataset, ConfigError> {
        Ok(match &self.person_period {
            Some(ped) => TabularDataset::person_period(frame, ped.to_meta()?)?,
            None => TabularDataset::new(frame),
        })
    }

    /// Tags `frame` as functional person-period data with the given matrix
    /// columns and the request's `[[func_spec]]` tables.
    pub fn functional_dataset(
        &self,
        frame: DataFrame,
        columns: Vec<FunctionalColumn>,
    ) -> Result<TabularDataset, ConfigError> {
        let ped = self.person_period.as_ref().ok_or_else(|| {
            ConfigError::Invalid("functional data needs a [person_period] table".to_string())
        })?;
        let specs = self.func_specs.iter().map(FuncSpecConfig::to_spec).collect();
        Ok(TabularDataset::functional(
            frame,
            ped.to_meta()?,
            columns,
            specs,
        )?)
    }

    pub fn apply(&self, frame: DataFrame) -> Result<DataFrame, ConfigError> {
        let dataset = self.dataset(frame)?;
        Ok(make_newdata(&dataset, &self.assignments()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::AssignedValue;
    use crate::frame_ops::column_names;
    use polars::prelude::*;
    use tempfile::tempdir;

    const REQUEST: &str = r#"
[person_period]
id_var = "id"
breaks = [0.0, 500.0, 1000.0]
interval_vars = ["tstart", "tend", "offset"]

[[func_spec]]
z_var = "z"
tz_var = "tz"
suffix = "tz"
lag_lead = { kind = "window", lag = 1.0, lead = 4.0 }

[[assign]]
target = "age"
values = [50.0, 55.0]

[[assign]]
target = "tend"
transform = "unique"
"#;

    #[test]
    fn parses_assignments_and_person_period() {
        let request = NewdataRequest::from_toml_str(REQUEST).unwrap();
        let assignments = request.assignments().unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(matches!(
            &assignments[1].value,
            AssignedValue::Transform { column, transform: Transform::Unique } if column == "tend"
        ));
        let meta = request.person_period.as_ref().unwrap().to_meta().unwrap();
        assert!(meta.is_interval_var("offset"));
        assert!(!meta.is_interval_var("status_in_interval"));
        let spec = request.func_specs[0].to_spec();
        assert_eq!(spec.ll_name(), "LL_tz");
        assert_eq!(spec.lag_lead.indicator(3.0, 1.0), 1);
        assert_eq!(spec.lag_lead.indicator(1.5, 1.0), 0);
    }

    #[test]
    fn rejects_ambiguous_or_incomplete_assignments() {
        let both = AssignmentConfig {
            target: "x".to_string(),
            values: Some(vec![1.0]),
            transform: Some(TransformKind::Mean),
            ..Default::default()
        };
        assert!(matches!(both.to_assignment(), Err(ConfigError::Invalid(_))));
        let no_n = AssignmentConfig {
            target: "x".to_string(),
            transform: Some(TransformKind::SeqRange),
            ..Default::default()
        };
        assert!(matches!(no_n.to_assignment(), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            NewdataRequest::from_toml_str("assign = 3"),
            Err(ConfigError::TomlParseError(_))
        ));
    }

    #[test]
    fn saved_request_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.toml");
        let path = path.to_str().unwrap();
        let request = NewdataRequest::from_toml_str(REQUEST).unwrap();
        request.save(path).unwrap();
        assert_eq!(NewdataRequest::load(path).unwrap(), request);
    }

    #[test]
    fn apply_builds_person_period_newdata() {
        let frame = DataFrame::new(vec![
            Column::new("id".into(), [1i32, 1, 2]),
            Column::new("tstart".into(), [0.0, 500.0, 0.0]),
            Column::new("tend".into(), [500.0, 1000.0, 500.0]),
            Column::new("offset".into(), [500f64.ln(); 3]),
            Column::new("age".into(), [40.0, 40.0, 60.0]),
        ])
        .unwrap();
        let request = NewdataRequest::from_toml_str(REQUEST).unwrap();
        let ndf = request.apply(frame).unwrap();
        assert_eq!(ndf.height(), 4);
        assert_eq!(
            column_names(&ndf),
            vec!["tstart", "tend", "interval_length", "interval_midpoint", "offset", "id", "age"]
        );
    }

    #[test]
    fn functional_dataset_needs_person_period() {
        let frame = DataFrame::new(vec![Column::new("id".into(), [1i32, 2])]).unwrap();
        let err = NewdataRequest::default()
            .functional_dataset(frame, Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
