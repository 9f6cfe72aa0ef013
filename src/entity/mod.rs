//! MLflow entities
//!
//! Typed records for the objects the export/import engine walks. Field
//! names follow the MLflow schema so that `run.json` and `model.json` read
//! like the server's own responses.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Run (N) ──< FileInfo (N) [artifacts]
//!                     │
//!                     └──< ModelVersion (N) >── RegisteredModel (1)
//!                            (run_id, source)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use mlflow_porter::entity::{Metric, RunInfo, RunStatus, Stage};
//!
//! let info = RunInfo::new("48cf29167ddb4e09", "3", "/opt/mlflow/mlruns/3/48cf29167ddb4e09/artifacts");
//! assert_eq!(info.status, RunStatus::Running);
//!
//! let metric = Metric::builder("rmse", 0.71).step(10).build();
//! assert_eq!(metric.step(), 10);
//!
//! let stage: Stage = "production".parse().unwrap();
//! assert_eq!(stage, Stage::Production);
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod model_record;
mod run_record;

use std::collections::BTreeMap;

pub use artifact_record::FileInfo;
pub use experiment_record::{Experiment, ExperimentBuilder};
pub use metric_record::{Metric, MetricBuilder};
pub use model_record::{ModelVersion, ModelVersionStatus, NewModelVersion, RegisteredModel, Stage};
pub use run_record::{LifecycleStage, Run, RunData, RunInfo, RunStatus, RUN_NAME_TAG};

/// Tag bag of a run, experiment, model or version.
///
/// Ordered so that manifests serialize deterministically. Keys under the
/// reserved `mlflow_export_import.` namespace are managed by
/// [`crate::provenance`].
pub type TagSet = BTreeMap<String, String>;
