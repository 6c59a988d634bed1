//! Time-varying (functional) covariates of person-period data.
//!
//! A cumulative effect term stores, for every person-period row, the whole
//! exposure history as a row of a matrix: exposure values (`z_var`), the
//! times at which they were recorded (`tz_var`), optionally the latency
//! `t - tz`, and the lag-lead indicator `LL` that masks which of those
//! exposures are in effect at the row's follow-up time.

use std::fmt;
use std::sync::Arc;

use ndarray::Array2;
use polars::prelude::*;

use crate::error::ReshapeError;
use crate::frame_ops::{float_values, has_column};
use crate::intervals::TEND;

const LAG_LEAD_PREFIX: &str = "LL";

/// Indicator deciding whether an exposure recorded at `tz` still acts at
/// follow-up time `t`.
#[derive(Clone, Default)]
pub enum LagLead {
    /// Active from the exposure time onward (`t >= tz`).
    #[default]
    Onset,
    /// Active from `tz + lag` through `tz + lag + lead`.
    Window { lag: f64, lead: f64 },
    Custom(Arc<dyn Fn(f64, f64) -> bool + Send + Sync>),
}

impl fmt::Debug for LagLead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LagLead::Onset => write!(f, "Onset"),
            LagLead::Window { lag, lead } => f
                .debug_struct("Window")
                .field("lag", lag)
                .field("lead", lead)
                .finish(),
            LagLead::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl LagLead {
    pub fn custom<F>(function: F) -> Self
    where
        F: Fn(f64, f64) -> bool + Send + Sync + 'static,
    {
        LagLead::Custom(Arc::new(function))
    }

    pub fn is_active(&self, t: f64, tz: f64) -> bool {
        match self {
            LagLead::Onset => t >= tz,
            LagLead::Window { lag, lead } => t >= tz + lag && t <= tz + lag + lead,
            LagLead::Custom(function) => function(t, tz),
        }
    }

    #[inline]
    pub fn indicator(&self, t: f64, tz: f64) -> i32 {
        i32::from(self.is_active(t, tz))
    }

    /// Lag-lead matrix with one row per follow-up time and one column per
    /// exposure time.
    pub fn matrix(&self, t: &[f64], tz: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((t.len(), tz.len()), |(i, j)| {
            f64::from(self.indicator(t[i], tz[j]))
        })
    }
}

/// Descriptor of one cumulative effect term.
#[derive(Debug, Clone)]
pub struct FuncSpec {
    pub z_var: String,
    pub latency_var: Option<String>,
    pub tz_var: String,
    pub suffix: Option<String>,
    pub lag_lead: LagLead,
}

impl FuncSpec {
    pub fn new(z_var: impl Into<String>, tz_var: impl Into<String>) -> Self {
        Self {
            z_var: z_var.into(),
            latency_var: None,
            tz_var: tz_var.into(),
            suffix: None,
            lag_lead: LagLead::Onset,
        }
    }

    pub fn with_latency(mut self, latency_var: impl Into<String>) -> Self {
        self.latency_var = Some(latency_var.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_lag_lead(mut self, lag_lead: LagLead) -> Self {
        self.lag_lead = lag_lead;
        self
    }

    /// Name of the lag-lead matrix column, `LL` or `LL_<suffix>`.
    pub fn ll_name(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{LAG_LEAD_PREFIX}_{suffix}"),
            None => LAG_LEAD_PREFIX.to_string(),
        }
    }

    /// Name of the latency matrix column, present only with a latency transform.
    pub fn latency_name(&self) -> Option<String> {
        self.latency_var
            .as_ref()
            .map(|_| format!("{}_latency", self.tz_var))
    }

    /// Argument handed to the lag-lead function for an exposure recorded at
    /// `tz` and evaluated at `tend`.
    #[inline]
    pub fn exposure_time(&self, tend: f64, tz: f64) -> f64 {
        if self.latency_var.is_some() {
            tend - tz
        } else {
            tz
        }
    }

    fn claims(&self, ll_name: &str) -> bool {
        let rest = ll_name
            .strip_prefix(LAG_LEAD_PREFIX)
            .map(|rest| rest.trim_start_matches('_'))
            .unwrap_or(ll_name);
        if rest.is_empty() {
            return false;
        }
        self.suffix
            .as_deref()
            .is_some_and(|suffix| rest.contains(suffix))
            || rest.contains(self.z_var.as_str())
    }
}

/// A matrix-valued column: one matrix row per dataset row.
#[derive(Debug, Clone)]
pub struct FunctionalColumn {
    pub name: String,
    pub values: Array2<f64>,
}

impl FunctionalColumn {
    pub fn new(name: impl Into<String>, values: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn is_lag_lead(&self) -> bool {
        self.name.starts_with(LAG_LEAD_PREFIX)
    }

    /// All matrix entries in row-major order.
    pub fn flattened(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    fn first_row_mean(&self) -> Option<f64> {
        if self.values.nrows() == 0 {
            return None;
        }
        self.values.row(0).mean()
    }

    fn first_value(&self) -> Option<f64> {
        self.values.get((0, 0)).copied()
    }
}

/// One-row stand-in for a "typical" exposure history.
///
/// Exposure columns are averaged over the first row's history; time grids,
/// latency and lag-lead columns keep the first row's first entry.
pub fn summarize_functional(
    columns: &[&FunctionalColumn],
    specs: &[FuncSpec],
) -> Result<DataFrame, ReshapeError> {
    let summary: Vec<Column> = columns
        .iter()
        .map(|column| {
            let is_exposure = specs.iter().any(|spec| spec.z_var == column.name);
            let value = if is_exposure {
                column.first_row_mean()
            } else {
                column.first_value()
            };
            Column::new(column.name.as_str().into(), [value])
        })
        .collect();
    Ok(DataFrame::new(summary)?)
}

/// Spec owning a lag-lead column: the first whose suffix or exposure name
/// appears in the column name, else the first spec.
pub fn owning_spec<'a>(specs: &'a [FuncSpec], ll_name: &str) -> Option<&'a FuncSpec> {
    specs
        .iter()
        .find(|spec| spec.claims(ll_name))
        .or_else(|| specs.first())
}

/// Recomputes lag-lead columns so they agree with each row's `tend`.
pub fn adjust_lag_lead(
    frame: &DataFrame,
    ll_columns: &[String],
    specs: &[FuncSpec],
) -> Result<DataFrame, ReshapeError> {
    let mut frame = frame.clone();
    for ll_name in ll_columns {
        if !has_column(&frame, ll_name) {
            continue;
        }
        let Some(spec) = owning_spec(specs, ll_name) else {
            continue;
        };
        let tend = float_values(
            frame
                .column(TEND)
                .map_err(|_| ReshapeError::ColumnNotFound(TEND.to_string()))?,
        )?;
        let tz = float_values(
            frame
                .column(&spec.tz_var)
                .map_err(|_| ReshapeError::ColumnNotFound(spec.tz_var.clone()))?,
        )?;
        let indicators: Vec<Option<i32>> = tend
            .iter()
            .zip(&tz)
            .map(|(t, z)| match (t, z) {
                (Some(t), Some(z)) => Some(spec.lag_lead.indicator(*t, spec.exposure_time(*t, *z))),
                _ => None,
            })
            .collect();
        frame.with_column(Column::new(ll_name.as_str().into(), indicators))?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn onset_and_window_indicators() {
        assert_eq!(LagLead::Onset.indicator(5.0, 3.0), 1);
        assert_eq!(LagLead::Onset.indicator(2.0, 3.0), 0);
        let window = LagLead::Window { lag: 2.0, lead: 5.0 };
        assert_eq!(window.indicator(4.0, 3.0), 0);
        assert_eq!(window.indicator(5.0, 3.0), 1);
        assert_eq!(window.indicator(10.0, 3.0), 1);
        assert_eq!(window.indicator(10.5, 3.0), 0);
        let custom = LagLead::custom(|t, tz| t - tz > 1.0);
        assert_eq!(custom.indicator(3.0, 1.0), 1);
    }

    #[test]
    fn lag_lead_matrix_is_lower_triangular_for_onset() {
        let grid = [0.0, 1.0, 2.0];
        let ll = LagLead::Onset.matrix(&grid, &grid);
        assert_eq!(ll, array![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]]);
    }

    #[test]
    fn spec_names_follow_suffix_and_latency() {
        let plain = FuncSpec::new("z.tz1", "tz1");
        assert_eq!(plain.ll_name(), "LL");
        assert_eq!(plain.latency_name(), None);
        let suffixed = FuncSpec::new("z.tz2", "tz2")
            .with_suffix("tz2")
            .with_latency("latency");
        assert_eq!(suffixed.ll_name(), "LL_tz2");
        assert_eq!(suffixed.latency_name().as_deref(), Some("tz2_latency"));
        assert_eq!(suffixed.exposure_time(10.0, 4.0), 6.0);
        assert_eq!(plain.exposure_time(10.0, 4.0), 4.0);
    }

    #[test]
    fn owning_spec_matches_by_name_or_defaults_to_first() {
        let specs = vec![
            FuncSpec::new("z.tz1", "tz1").with_suffix("tz1"),
            FuncSpec::new("z.tz2", "tz2").with_suffix("tz2"),
        ];
        assert_eq!(owning_spec(&specs, "LL_tz2").unwrap().tz_var, "tz2");
        assert_eq!(owning_spec(&specs, "LL").unwrap().tz_var, "tz1");
        assert_eq!(owning_spec(&specs, "LL_other").unwrap().tz_var, "tz1");
        assert!(owning_spec(&[], "LL").is_none());
    }

    #[test]
    fn functional_summary_averages_exposures_only() {
        let z = FunctionalColumn::new("z.tz1", array![[1.0, 2.0, 6.0], [9.0, 9.0, 9.0]]);
        let tz = FunctionalColumn::new("tz1", array![[-5.0, 0.0, 5.0], [-5.0, 0.0, 5.0]]);
        let specs = vec![FuncSpec::new("z.tz1", "tz1")];
        let summary = summarize_functional(&[&z, &tz], &specs).unwrap();
        assert_eq!(summary.height(), 1);
        let z_value = summary.column("z.tz1").unwrap().f64().unwrap().get(0);
        let tz_value = summary.column("tz1").unwrap().f64().unwrap().get(0);
        assert_eq!(z_value, Some(3.0));
        assert_eq!(tz_value, Some(-5.0));
    }

    #[test]
    fn adjust_lag_lead_uses_tend() {
        let frame = DataFrame::new(vec![
            Column::new(TEND.into(), [1.0, 4.0]),
            Column::new("tz1".into(), [2.0, 2.0]),
            Column::new("LL".into(), [1.0, 0.0]),
        ])
        .unwrap();
        let specs = vec![FuncSpec::new("z.tz1", "tz1")];
        let adjusted = adjust_lag_lead(&frame, &["LL".to_string()], &specs).unwrap();
        let ll: Vec<Option<i32>> = adjusted.column("LL").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(ll, vec![Some(0), Some(1)]);
    }

    #[test]
    fn adjust_lag_lead_passes_latency_to_the_rule() {
        let frame = DataFrame::new(vec![
            Column::new(TEND.into(), [3.0, 6.0, 3.0]),
            Column::new("tz".into(), [Some(1.0), Some(1.0), None]),
            Column::new("LL_lat".into(), [0.0, 0.0, 0.0]),
        ])
        .unwrap();
        let specs = vec![
            FuncSpec::new("z.other", "other").with_suffix("other"),
            FuncSpec::new("z.lat", "tz")
                .with_suffix("lat")
                .with_latency("latency")
                .with_lag_lead(LagLead::custom(|_, latency| (2.0..=4.0).contains(&latency))),
        ];
        let adjusted = adjust_lag_lead(&frame, &["LL_lat".to_string()], &specs).unwrap();
        let ll: Vec<Option<i32>> = adjusted
            .column("LL_lat")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ll, vec![Some(1), Some(0), None]);
    }
}
