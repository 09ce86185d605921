//! End-to-end training: load, clean, train, publish. Plus the task
//! abstraction a scheduler uses to run it in-process or as a subprocess.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::ChurnConfig;
use crate::data::{clean_with_report, CleanedRecord, CsvSource, DataError};
use crate::monitoring::{
    DriftConfig, DriftError, DriftMonitor, DriftReport, DriftScenario, NumericFrame, Workspace, WorkspaceError,
};
use crate::registry::{ModelRegistry, RegistryEntry, RegistryError, Selector};
use crate::training::{EvaluationMetrics, Trainer, TrainingError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("training error: {0}")]
    Training(#[from] TrainingError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("drift error: {0}")]
    Drift(#[from] DriftError),
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("training subprocess failed: {0}")]
    Subprocess(String),
    #[error("no new version of '{name}' was published (latest before: {before:?}, after: {after:?})")]
    PostconditionFailed {
        name: String,
        before: Option<u64>,
        after: Option<u64>,
    },
    #[error("training task aborted: {0}")]
    Task(String),
}

/// What a successful training run left in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedModel {
    pub name: String,
    pub version: u64,
    pub checksum: String,
    pub metrics: EvaluationMetrics,
    pub rows: usize,
}

impl From<RegistryEntry> for PublishedModel {
    fn from(entry: RegistryEntry) -> Self {
        Self {
            name: entry.name,
            version: entry.version,
            checksum: entry.checksum,
            rows: entry.artifact.dataset.rows,
            metrics: entry.artifact.metrics,
        }
    }
}

pub struct TrainingPipeline {
    config: ChurnConfig,
    registry: Arc<ModelRegistry>,
}

impl TrainingPipeline {
    pub fn new(config: ChurnConfig, registry: Arc<ModelRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Load the configured CSV, clean it, train and publish a new version.
    /// Nothing is published unless every step before it succeeded.
    pub fn run(&self) -> Result<PublishedModel, PipelineError> {
        let records = load_cleaned(&self.config.data.path, self.config.data.delimiter)?;

        let training = &self.config.training;
        let artifact = Trainer::from_config(training).train(&records, training.seed, training.holdout_fraction)?;
        let version = self.registry.publish(&training.model_name, &artifact)?;
        let entry = self.registry.resolve(&training.model_name, &Selector::Version(version))?;

        info!(
            model = %entry.name,
            version,
            accuracy = artifact.metrics.accuracy,
            f1_score = artifact.metrics.f1_score,
            pr_auc = artifact.metrics.pr_auc,
            "training run published"
        );
        Ok(PublishedModel::from(entry))
    }
}

/// Read and clean a CSV, logging any values that fell back to `0.0`.
pub fn load_cleaned(path: &Path, delimiter: char) -> Result<Vec<CleanedRecord>, PipelineError> {
    let raw = CsvSource::new(path).with_delimiter(delimiter).load()?;
    let (records, report) = clean_with_report(&raw);
    info!(rows = report.rows, path = %path.display(), "cleaned dataset");
    if report.total_coerced() > 0 {
        warn!(
            path = %path.display(),
            coerced = report.total_coerced(),
            columns = ?report.coerced,
            "non-numeric feature values replaced with 0.0"
        );
    }
    Ok(records)
}

/// Batch entry point: succeeds only once a new version is fully published.
pub fn run_training(config: &ChurnConfig) -> Result<PublishedModel, PipelineError> {
    let registry = Arc::new(ModelRegistry::open(&config.registry.root)?);
    TrainingPipeline::new(config.clone(), registry).run()
}

/// Compare a current batch (from `current`, or the synthetic drift scenario)
/// with the reference dataset, then store the report in the monitoring
/// workspace, creating the project and its dashboard panels if needed.
pub fn run_drift_check(config: &ChurnConfig, current: Option<&Path>) -> Result<DriftReport, PipelineError> {
    let monitoring = &config.monitoring;
    let reference = load_cleaned(&config.data.path, config.data.delimiter)?;
    let current = match current {
        Some(path) => load_cleaned(path, config.data.delimiter)?,
        None => {
            info!(fraction = monitoring.sample_fraction, "building synthetic drifted batch");
            DriftScenario::from_monitoring(monitoring).apply(&reference)
        }
    };

    let monitor = DriftMonitor::new(DriftConfig::from_monitoring(monitoring));
    let columns: Vec<&str> = monitoring.numeric_columns.iter().map(String::as_str).collect();
    let report = monitor.compare(
        &NumericFrame::from_records(&reference)?,
        &NumericFrame::from_records(&current)?,
        &columns,
    )?;

    let workspace = Workspace::open(&monitoring.workspace_dir)?;
    let project = workspace.create_project(&monitoring.project_name, &monitoring.project_description)?;
    workspace.install_default_panels(project.id)?;
    workspace.add_run(project.id, &report)?;
    Ok(report)
}

/// One training run, however it is executed.
#[async_trait]
pub trait TrainingTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<PublishedModel, PipelineError>;
}

/// Runs the pipeline on the blocking thread pool of the current runtime.
pub struct InProcessTraining {
    pipeline: Arc<TrainingPipeline>,
}

impl InProcessTraining {
    pub fn new(pipeline: TrainingPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[async_trait]
impl TrainingTask for InProcessTraining {
    fn name(&self) -> &str {
        "in-process-training"
    }

    async fn run(&self) -> Result<PublishedModel, PipelineError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run())
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
    }
}

/// Runs training as a child process, typically `churnwatch train`.
///
/// Succeeds only if the process exits with status 0 and the registry's latest
/// version of the model is higher afterwards than before.
pub struct SubprocessTraining {
    program: PathBuf,
    args: Vec<String>,
    registry: Arc<ModelRegistry>,
    model_name: String,
    timeout: Option<Duration>,
}

impl SubprocessTraining {
    pub fn new(program: impl Into<PathBuf>, registry: Arc<ModelRegistry>, model_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["train".to_string()],
            registry,
            model_name: model_name.into(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn latest_version(&self) -> Result<Option<u64>, PipelineError> {
        Ok(self.registry.versions(&self.model_name)?.last().copied())
    }
}

#[async_trait]
impl TrainingTask for SubprocessTraining {
    fn name(&self) -> &str {
        "subprocess-training"
    }

    async fn run(&self) -> Result<PublishedModel, PipelineError> {
        let before = self.latest_version()?;

        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        let child = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| PipelineError::Subprocess(format!("timed out after {}s", limit.as_secs())))?,
            None => child.await,
        }
        .map_err(|e| PipelineError::Subprocess(format!("failed to spawn {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Subprocess(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let after = self.latest_version()?;
        match after {
            Some(version) if Some(version) > before => {
                let entry = self.registry.resolve(&self.model_name, &Selector::Version(version))?;
                Ok(PublishedModel::from(entry))
            }
            _ => Err(PipelineError::PostconditionFailed {
                name: self.model_name.clone(),
                before,
                after,
            }),
        }
    }
}

/// Run `task` once and log the outcome. Failures are returned, never retried.
pub async fn run_flow(task: &dyn TrainingTask) -> Result<PublishedModel, PipelineError> {
    info!(task = task.name(), "starting training flow");
    let result = task.run().await;
    match &result {
        Ok(published) => info!(
            task = task.name(),
            model = %published.name,
            version = published.version,
            "training flow succeeded"
        ),
        Err(e) => error!(task = task.name(), error = %e, "training flow failed"),
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::training::trainer::tests::synthetic_customers;
    use std::fmt::Write as _;
    use std::path::Path;
    use tempfile::TempDir;

    /// Telco-shaped CSV with raw casing, a blank total charge and Yes/No labels.
    pub(crate) fn write_telco_csv(path: &Path, rows: usize, seed: u64) {
        let mut csv = String::from("customerID,gender,tenure,MonthlyCharges,TotalCharges,Churn\n");
        for (i, record) in synthetic_customers(rows, seed).iter().enumerate() {
            let total = if i == 0 {
                " ".to_string()
            } else {
                format!("{:.2}", record.totalcharges)
            };
            let gender = if i % 2 == 0 { "Female" } else { "Male" };
            let churn = if record.churn == 1 { "Yes" } else { "No" };
            let _ = writeln!(
                csv,
                "{:04}-ABCD,{},{},{:.2},{},{}",
                i, gender, record.tenure, record.monthlycharges, total, churn
            );
        }
        std::fs::write(path, csv).unwrap();
    }

    fn config_in(dir: &Path) -> ChurnConfig {
        let mut config = ChurnConfig::default();
        config.data.path = dir.join("telco.csv");
        config.registry.root = dir.join("registry");
        config
    }

    #[test]
    fn test_run_publishes_versions() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        write_telco_csv(&config.data.path, 300, 11);

        let first = run_training(&config).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.rows, 300);
        let second = run_training(&config).unwrap();
        assert_eq!(second.version, 2);
        // Same data and seed give the same metrics
        assert_eq!(first.metrics, second.metrics);
    }

    #[test]
    fn test_missing_data_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let err = run_training(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Data(DataError::Io { .. })));
        let registry = ModelRegistry::open(&config.registry.root).unwrap();
        assert!(registry.versions(&config.training.model_name).unwrap().is_empty());
    }

    #[test]
    fn test_drift_check_stores_runs() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.monitoring.workspace_dir = dir.path().join("workspace");
        write_telco_csv(&config.data.path, 1000, 3);

        let first = run_drift_check(&config, None).unwrap();
        let second = run_drift_check(&config, None).unwrap();
        assert!(first.column("monthlycharges").unwrap().drifted);
        assert_eq!(first.columns, second.columns);

        let workspace = Workspace::open(&config.monitoring.workspace_dir).unwrap();
        let project = workspace.find_project(&config.monitoring.project_name).unwrap().unwrap();
        assert_eq!(project.panels.len(), 3);
        assert_eq!(workspace.runs(project.id).unwrap().len(), 2);
    }

    #[test]
    fn test_drift_check_against_itself() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.monitoring.workspace_dir = dir.path().join("workspace");
        write_telco_csv(&config.data.path, 200, 3);

        let report = run_drift_check(&config, Some(&config.data.path)).unwrap();
        assert_eq!(report.drifted_column_count, 0);
        assert!(!report.dataset_drift);
    }

    #[test]
    fn test_drift_check_uses_configured_columns() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.monitoring.workspace_dir = dir.path().join("workspace");
        config.monitoring.numeric_columns = vec!["monthlycharges".to_string()];
        write_telco_csv(&config.data.path, 300, 3);

        let report = run_drift_check(&config, None).unwrap();
        assert_eq!(report.columns.len(), 1);
        assert_eq!(report.columns[0].column, "monthlycharges");

        config.monitoring.numeric_columns = vec!["gender".to_string()];
        let err = run_drift_check(&config, None).unwrap_err();
        assert!(matches!(err, PipelineError::Drift(DriftError::UnknownColumn(_))));
        let workspace = Workspace::open(&config.monitoring.workspace_dir).unwrap();
        let project = workspace.find_project(&config.monitoring.project_name).unwrap().unwrap();
        assert_eq!(workspace.runs(project.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_process_task() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        write_telco_csv(&config.data.path, 200, 5);
        let registry = Arc::new(ModelRegistry::open(&config.registry.root).unwrap());

        let task = InProcessTraining::new(TrainingPipeline::new(config, Arc::clone(&registry)));
        let published = run_flow(&task).await.unwrap();
        assert_eq!(published.version, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_requires_zero_exit() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::open(dir.path()).unwrap());
        let task = SubprocessTraining::new("sh", registry, "churn").with_args(["-c", "exit 3"]);

        assert!(matches!(run_flow(&task).await, Err(PipelineError::Subprocess(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_requires_new_version() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::open(dir.path()).unwrap());
        let task = SubprocessTraining::new("sh", registry, "churn").with_args(["-c", "exit 0"]);

        assert!(matches!(
            run_flow(&task).await,
            Err(PipelineError::PostconditionFailed {
                before: None,
                after: None,
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_success_reads_published_version() {
        let source_dir = TempDir::new().unwrap();
        let source = ModelRegistry::open(source_dir.path()).unwrap();
        let artifact = Trainer::default().train(&synthetic_customers(200, 2), 42, 0.2).unwrap();
        source.publish("churn", &artifact).unwrap();

        // The child "publishes" by copying a complete version directory in
        let target_dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::open(target_dir.path()).unwrap());
        let script = format!(
            "mkdir -p {dst}/churn/versions && cp -r {src}/churn/versions/1 {dst}/churn/versions/1",
            src = source_dir.path().display(),
            dst = target_dir.path().display()
        );
        let task = SubprocessTraining::new("sh", Arc::clone(&registry), "churn")
            .with_args(["-c".to_string(), script])
            .with_timeout(Duration::from_secs(30));

        let published = run_flow(&task).await.unwrap();
        assert_eq!(published.version, 1);
        assert_eq!(published.metrics, artifact.metrics);
    }
}
