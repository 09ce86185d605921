//! On-disk monitoring workspace: projects, dashboard panels and drift runs.
//!
//! ```text
//! <dir>/projects/<project_id>/project.json
//! <dir>/projects/<project_id>/runs/<timestamp>_<run_id>.json
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::monitoring::drift::{DriftReport, QuantileValue};
use crate::persistence::{atomic_write_json, load_json};

const PROJECTS_DIR: &str = "projects";
const PROJECT_FILE: &str = "project.json";
const RUNS_DIR: &str = "runs";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("project {0} not found")]
    ProjectNotFound(Uuid),
    #[error("workspace I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("workspace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Text,
    BarPlot,
    LinePlot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelSize {
    #[default]
    Full,
    Half,
}

/// A value a panel plots, read from each stored drift report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelMetric {
    DriftedColumnsCount,
    ShareOfDriftedColumns,
    /// Quantile of a column in the current batch
    QuantileValue { column: String, quantile: f64 },
    /// Quantile of a column in the reference dataset
    ReferenceQuantileValue { column: String, quantile: f64 },
    MaxValue { column: String },
    KsStatistic { column: String },
}

impl PanelMetric {
    pub fn value(&self, report: &DriftReport) -> Option<f64> {
        match self {
            PanelMetric::DriftedColumnsCount => Some(report.drifted_column_count as f64),
            PanelMetric::ShareOfDriftedColumns => Some(report.share_of_drifted_columns),
            PanelMetric::QuantileValue { column, quantile } => {
                let drift = report.column(column)?;
                pick_quantile(&drift.current_quantiles, drift.current_median, *quantile)
            }
            PanelMetric::ReferenceQuantileValue { column, quantile } => {
                let drift = report.column(column)?;
                pick_quantile(&drift.reference_quantiles, drift.reference_median, *quantile)
            }
            PanelMetric::MaxValue { column } => report.column(column).map(|c| c.current_max),
            PanelMetric::KsStatistic { column } => report.column(column).map(|c| c.statistic),
        }
    }
}

// The median is always recorded, whether or not 0.5 is a configured quantile
fn pick_quantile(quantiles: &[QuantileValue], median: f64, quantile: f64) -> Option<f64> {
    if quantile == 0.5 {
        return Some(median);
    }
    quantiles.iter().find(|q| q.quantile == quantile).map(|q| q.value)
}

impl fmt::Display for PanelMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelMetric::DriftedColumnsCount => f.write_str("DriftedColumnsCount"),
            PanelMetric::ShareOfDriftedColumns => f.write_str("ShareOfDriftedColumns"),
            PanelMetric::QuantileValue { column, quantile } => {
                write!(f, "QuantileValue(column={},quantile={})", column, quantile)
            }
            PanelMetric::ReferenceQuantileValue { column, quantile } => {
                write!(f, "ReferenceQuantileValue(column={},quantile={})", column, quantile)
            }
            PanelMetric::MaxValue { column } => write!(f, "MaxValue(column={})", column),
            PanelMetric::KsStatistic { column } => write!(f, "KsStatistic(column={})", column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelValue {
    pub metric: PanelMetric,
    pub legend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub title: String,
    pub kind: PanelKind,
    #[serde(default)]
    pub values: Vec<PanelValue>,
    #[serde(default)]
    pub size: PanelSize,
}

impl PanelSpec {
    pub fn text(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: PanelKind::Text,
            values: Vec::new(),
            size: PanelSize::Full,
        }
    }

    pub fn bar_plot(title: impl Into<String>, values: Vec<PanelValue>, size: PanelSize) -> Self {
        Self {
            title: title.into(),
            kind: PanelKind::BarPlot,
            values,
            size,
        }
    }

    pub fn line_plot(title: impl Into<String>, values: Vec<PanelValue>, size: PanelSize) -> Self {
        Self {
            title: title.into(),
            kind: PanelKind::LinePlot,
            values,
            size,
        }
    }

    /// Panels with the same kind and title are the same panel.
    pub fn same_panel(&self, other: &PanelSpec) -> bool {
        self.kind == other.kind && self.title == other.title
    }
}

/// The churn dashboard: a title, drifted column counts and the reference
/// and current median monthly charge.
pub fn default_panels() -> Vec<PanelSpec> {
    vec![
        PanelSpec::text("Telco Churn Dashboard"),
        PanelSpec::bar_plot(
            "Drifted Columns",
            vec![PanelValue {
                metric: PanelMetric::DriftedColumnsCount,
                legend: "count".to_string(),
            }],
            PanelSize::Half,
        ),
        PanelSpec::line_plot(
            "Median MonthlyCharges (ref vs current)",
            vec![
                PanelValue {
                    metric: PanelMetric::ReferenceQuantileValue {
                        column: "monthlycharges".to_string(),
                        quantile: 0.5,
                    },
                    legend: "reference".to_string(),
                },
                PanelValue {
                    metric: PanelMetric::QuantileValue {
                        column: "monthlycharges".to_string(),
                        quantile: 0.5,
                    },
                    legend: "current".to_string(),
                },
            ],
            PanelSize::Half,
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
}

/// One plotted point of a panel value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub legend: String,
    pub value: f64,
}

#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl Workspace {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(PROJECTS_DIR))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids are derived from names, so the same name always maps to the same project.
    pub fn project_id(name: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// Create the project, or return it unchanged if it already exists.
    pub fn create_project(&self, name: &str, description: &str) -> Result<Project, WorkspaceError> {
        let id = Self::project_id(name);
        let _guard = self.write_lock.lock();
        if let Some(existing) = load_json::<Project>(&self.project_file(id))? {
            debug!(project = %id, "project already exists");
            return Ok(existing);
        }

        let project = Project {
            id,
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            panels: Vec::new(),
        };
        atomic_write_json(&self.project_file(id), &project)?;
        fs::create_dir_all(self.runs_dir(id))?;
        info!(project = %id, name, "created monitoring project");
        Ok(project)
    }

    pub fn project(&self, id: Uuid) -> Result<Project, WorkspaceError> {
        load_json(&self.project_file(id))?.ok_or(WorkspaceError::ProjectNotFound(id))
    }

    pub fn find_project(&self, name: &str) -> Result<Option<Project>, WorkspaceError> {
        Ok(load_json(&self.project_file(Self::project_id(name)))?)
    }

    /// Insert `panel`, or replace the panel with the same kind and title.
    /// Returns whether the stored project changed.
    pub fn add_panel(&self, project_id: Uuid, panel: PanelSpec) -> Result<bool, WorkspaceError> {
        let _guard = self.write_lock.lock();
        let mut project = self.project(project_id)?;

        match project.panels.iter_mut().find(|p| p.same_panel(&panel)) {
            Some(existing) if *existing == panel => return Ok(false),
            Some(existing) => *existing = panel,
            None => project.panels.push(panel),
        }
        atomic_write_json(&self.project_file(project_id), &project)?;
        Ok(true)
    }

    /// Upsert every default panel. Returns how many were added or changed.
    pub fn install_default_panels(&self, project_id: Uuid) -> Result<usize, WorkspaceError> {
        let mut changed = 0;
        for panel in default_panels() {
            if self.add_panel(project_id, panel)? {
                changed += 1;
            }
        }
        if changed > 0 {
            info!(project = %project_id, changed, "dashboard panels initialised");
        }
        Ok(changed)
    }

    /// Append a drift report to the project's run history.
    pub fn add_run(&self, project_id: Uuid, report: &DriftReport) -> Result<PathBuf, WorkspaceError> {
        if !self.project_file(project_id).exists() {
            return Err(WorkspaceError::ProjectNotFound(project_id));
        }
        let file_name = format!(
            "{}_{}.json",
            report.timestamp.format("%Y%m%dT%H%M%S%.9fZ"),
            report.run_id.simple()
        );
        let path = self.runs_dir(project_id).join(file_name);
        atomic_write_json(&path, report)?;
        info!(project = %project_id, run_id = %report.run_id, "stored drift run");
        Ok(path)
    }

    /// Stored reports, oldest first.
    pub fn runs(&self, project_id: Uuid) -> Result<Vec<DriftReport>, WorkspaceError> {
        if !self.project_file(project_id).exists() {
            return Err(WorkspaceError::ProjectNotFound(project_id));
        }
        let dir = match fs::read_dir(self.runs_dir(project_id)) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in dir {
            let path = entry?.path();
            let is_run = path.extension().is_some_and(|ext| ext == "json")
                && !path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if is_run {
                paths.push(path);
            }
        }
        paths.sort();

        let mut runs = Vec::with_capacity(paths.len());
        for path in paths {
            runs.push(serde_json::from_slice(&fs::read(&path)?)?);
        }
        Ok(runs)
    }

    /// Values of one panel across all stored runs, oldest first.
    pub fn panel_series(&self, project_id: Uuid, panel: &PanelSpec) -> Result<Vec<SeriesPoint>, WorkspaceError> {
        let runs = self.runs(project_id)?;
        let mut points = Vec::new();
        for report in &runs {
            for value in &panel.values {
                if let Some(v) = value.metric.value(report) {
                    points.push(SeriesPoint {
                        timestamp: report.timestamp,
                        legend: value.legend.clone(),
                        value: v,
                    });
                }
            }
        }
        Ok(points)
    }

    fn project_dir(&self, id: Uuid) -> PathBuf {
        self.dir.join(PROJECTS_DIR).join(id.to_string())
    }

    fn project_file(&self, id: Uuid) -> PathBuf {
        self.project_dir(id).join(PROJECT_FILE)
    }

    fn runs_dir(&self, id: Uuid) -> PathBuf {
        self.project_dir(id).join(RUNS_DIR)
    }
}
