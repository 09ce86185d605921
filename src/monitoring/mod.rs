//! Data drift detection and the on-disk monitoring workspace.

pub mod drift;
pub mod scenario;
pub mod stats;
pub mod workspace;

pub use drift::{ColumnDrift, DriftConfig, DRIFT_COLUMNS, DriftError, DriftMonitor, DriftReport, NumericFrame, QuantileValue};
pub use scenario::{simulate_drift, DriftScenario};
pub use workspace::{
    default_panels, PanelKind, PanelMetric, PanelSize, PanelSpec, PanelValue, Project, SeriesPoint, Workspace,
    WorkspaceError,
};
