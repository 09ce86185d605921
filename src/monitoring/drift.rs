use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::MonitoringConfig;
use crate::data::CleanedRecord;
use crate::monitoring::stats;

/// Columns compared by default: the three features and the label.
pub const DRIFT_COLUMNS: [&str; 4] = ["tenure", "monthlycharges", "totalcharges", "churn"];
pub const KS_STATISTIC: &str = "ks";

#[derive(Debug, Error, PartialEq)]
pub enum DriftError {
    #[error("datasets have different columns: reference {reference:?}, current {current:?}")]
    SchemaMismatch {
        reference: Vec<String>,
        current: Vec<String>,
    },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("{0} dataset has no rows")]
    EmptyDataset(&'static str),
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("column '{column}' has a non-finite value at row {row}")]
    NonFinite { column: String, row: usize },
}

/// Named numeric columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFrame {
    columns: Vec<(String, Vec<f64>)>,
}

impl NumericFrame {
    /// Every value must be finite and every column the same length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, DriftError> {
        for (name, values) in &columns {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(DriftError::NonFinite {
                    column: name.clone(),
                    row,
                });
            }
        }
        if let Some((_, first)) = columns.first() {
            let expected = first.len();
            if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != expected) {
                return Err(DriftError::LengthMismatch {
                    column: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// The `tenure`, `monthlycharges`, `totalcharges` and `churn` columns.
    pub fn from_records(records: &[CleanedRecord]) -> Result<Self, DriftError> {
        let columns = DRIFT_COLUMNS
            .iter()
            .map(|name| {
                let values = records.iter().map(|r| r.numeric(name).unwrap_or(0.0)).collect();
                (name.to_string(), values)
            })
            .collect();
        Self::from_columns(columns)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| v.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// A column drifts when its KS statistic exceeds this
    pub ks_threshold: f64,
    pub quantiles: Vec<f64>,
    /// Dataset drift when at least this share of columns drifted
    pub drift_share: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self::from_monitoring(&MonitoringConfig::default())
    }
}

impl DriftConfig {
    pub fn from_monitoring(config: &MonitoringConfig) -> Self {
        Self {
            ks_threshold: config.ks_threshold,
            quantiles: config.quantiles.clone(),
            drift_share: config.drift_share,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileValue {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub reference_quantiles: Vec<QuantileValue>,
    pub current_quantiles: Vec<QuantileValue>,
    pub reference_median: f64,
    pub current_median: f64,
    pub reference_max: f64,
    pub current_max: f64,
    /// current minus reference
    pub median_shift: f64,
    pub max_shift: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub drifted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reference_rows: usize,
    pub current_rows: usize,
    pub statistic: String,
    pub threshold: f64,
    pub columns: Vec<ColumnDrift>,
    pub drifted_column_count: usize,
    pub share_of_drifted_columns: f64,
    pub dataset_drift: bool,
}

impl DriftReport {
    pub fn column(&self, name: &str) -> Option<&ColumnDrift> {
        self.columns.iter().find(|c| c.column == name)
    }
}

/// Compares a current batch against a reference dataset column by column.
#[derive(Debug, Clone, Default)]
pub struct DriftMonitor {
    config: DriftConfig,
}

impl DriftMonitor {
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Compare `numeric_columns` of `current` against `reference`. An empty
    /// slice compares every column. Both frames must have the same column set.
    pub fn compare(
        &self,
        reference: &NumericFrame,
        current: &NumericFrame,
        numeric_columns: &[&str],
    ) -> Result<DriftReport, DriftError> {
        let mut reference_names = reference.names();
        let mut current_names = current.names();
        reference_names.sort_unstable();
        current_names.sort_unstable();
        if reference_names != current_names {
            return Err(DriftError::SchemaMismatch {
                reference: reference.names().iter().map(|s| s.to_string()).collect(),
                current: current.names().iter().map(|s| s.to_string()).collect(),
            });
        }

        if let Some(unknown) = numeric_columns.iter().find(|c| reference.column(c).is_none()) {
            return Err(DriftError::UnknownColumn(unknown.to_string()));
        }
        let columns: Vec<&str> = if numeric_columns.is_empty() {
            reference.names()
        } else {
            numeric_columns.to_vec()
        };

        if reference.rows() == 0 || columns.is_empty() {
            return Err(DriftError::EmptyDataset("reference"));
        }
        if current.rows() == 0 {
            return Err(DriftError::EmptyDataset("current"));
        }

        let mut drifts = Vec::with_capacity(columns.len());
        for &name in &columns {
            let ref_values = reference
                .column(name)
                .ok_or_else(|| DriftError::UnknownColumn(name.to_string()))?;
            let cur_values = current
                .column(name)
                .ok_or_else(|| DriftError::UnknownColumn(name.to_string()))?;
            drifts.push(self.compare_column(name, ref_values, cur_values));
        }

        let drifted_column_count = drifts.iter().filter(|c| c.drifted).count();
        let share_of_drifted_columns = drifted_column_count as f64 / drifts.len() as f64;
        let report = DriftReport {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            reference_rows: reference.rows(),
            current_rows: current.rows(),
            statistic: KS_STATISTIC.to_string(),
            threshold: self.config.ks_threshold,
            columns: drifts,
            drifted_column_count,
            share_of_drifted_columns,
            dataset_drift: share_of_drifted_columns >= self.config.drift_share,
        };

        info!(
            run_id = %report.run_id,
            drifted = report.drifted_column_count,
            share = report.share_of_drifted_columns,
            dataset_drift = report.dataset_drift,
            "computed drift report"
        );
        Ok(report)
    }

    // Callers guarantee both samples are non-empty.
    fn compare_column(&self, name: &str, reference: &[f64], current: &[f64]) -> ColumnDrift {
        let reference = stats::sorted(reference);
        let current = stats::sorted(current);

        let quantiles_of = |sample: &[f64]| -> Vec<QuantileValue> {
            self.config
                .quantiles
                .iter()
                .map(|&q| QuantileValue {
                    quantile: q,
                    value: stats::quantile(sample, q).unwrap_or(f64::NAN),
                })
                .collect()
        };

        let reference_median = stats::quantile(&reference, 0.5).unwrap_or(f64::NAN);
        let current_median = stats::quantile(&current, 0.5).unwrap_or(f64::NAN);
        let reference_max = stats::max(&reference).unwrap_or(f64::NAN);
        let current_max = stats::max(&current).unwrap_or(f64::NAN);
        let statistic = stats::ks_statistic(&reference, &current);

        ColumnDrift {
            column: name.to_string(),
            reference_quantiles: quantiles_of(&reference),
            current_quantiles: quantiles_of(&current),
            reference_median,
            current_median,
            reference_max,
            current_max,
            median_shift: current_median - reference_median,
            max_shift: current_max - reference_max,
            statistic,
            p_value: stats::ks_p_value(statistic, reference.len(), current.len()),
            drifted: statistic > self.config.ks_threshold,
        }
    }
}
