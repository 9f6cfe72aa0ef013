//! Tracking/registry client seam
//!
//! [`TrackingClient`] is the only network boundary of the export/import
//! engine. Everything the engine needs from a tracking server (run CRUD,
//! artifact transfer, registry CRUD, notebook export) goes through it.
//!
//! Implementations:
//! - [`RestClient`]: blocking client for the MLflow REST API 2.0 (OSS or
//!   Databricks-hosted)
//! - [`InMemoryTrackingServer`]: process-local server used by tests and the
//!   comparison harness
//!
//! # Example
//!
//! ```rust
//! use mlflow_porter::client::{ExperimentTarget, InMemoryTrackingServer, TrackingClient};
//!
//! # fn main() -> mlflow_porter::Result<()> {
//! let server = InMemoryTrackingServer::new();
//! let experiment = ExperimentTarget::name("imported").resolve(&server)?;
//! let run = server.create_run(experiment.experiment_id(), 0, &Default::default())?;
//! server.log_param(run.run_id(), "alpha", "0.5")?;
//! assert_eq!(server.get_run(run.run_id())?.data.params["alpha"], "0.5");
//! # Ok(())
//! # }
//! ```

mod memory;
mod rest;

pub use memory::{ArtifactFlavor, InMemoryTrackingServer};
pub use rest::RestClient;

use std::path::{Path, PathBuf};

use crate::entity::{
    Experiment, FileInfo, Metric, ModelVersion, NewModelVersion, RegisteredModel, Run, RunStatus,
    Stage, TagSet,
};
use crate::run::NotebookFormat;
use crate::{Error, Result};

/// Capability set of an MLflow tracking server and model registry.
///
/// All calls are blocking. Errors use the crate taxonomy: missing entities
/// are [`Error::NotFound`], server-side conflicts are
/// [`Error::ParamConflict`] / [`Error::AlreadyExists`], artifact failures are
/// [`Error::Transport`].
pub trait TrackingClient {
    /// URI of the tracking server this client talks to.
    fn tracking_uri(&self) -> &str;

    /// Whether the server is a Databricks workspace.
    fn is_databricks(&self) -> bool {
        self.tracking_uri().starts_with("databricks")
    }

    /// Get an experiment by id.
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment>;

    /// Look up an experiment by name.
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// Create an experiment and return its id.
    fn create_experiment(&self, name: &str) -> Result<String>;

    /// Get a run with its params, latest metrics and tags.
    fn get_run(&self, run_id: &str) -> Result<Run>;

    /// Create a running run under `experiment_id`.
    fn create_run(&self, experiment_id: &str, start_time: i64, tags: &TagSet) -> Result<Run>;

    /// Log a param. Params are immutable once set.
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Log a metric point.
    fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()>;

    /// Set a tag, overwriting any previous value.
    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Move a run to a terminal status.
    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: Option<i64>) -> Result<()>;

    /// List the direct children of `path` (`None` for the artifact root).
    fn list_artifacts(&self, run_id: &str, path: Option<&str>) -> Result<Vec<FileInfo>>;

    /// Download everything under `path` (empty for the root) into `dst`,
    /// keeping paths relative to the run artifact root. Returns the local
    /// path corresponding to `path`.
    fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf>;

    /// Upload every file under `local_dir` to `artifact_path` (`None` for
    /// the root), keeping relative paths.
    fn log_artifacts(&self, run_id: &str, local_dir: &Path, artifact_path: Option<&str>)
        -> Result<()>;

    /// Get a registered model with its latest versions.
    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel>;

    /// Create a registered model.
    fn create_registered_model(
        &self,
        name: &str,
        description: &str,
        tags: &TagSet,
    ) -> Result<RegisteredModel>;

    /// Delete a registered model and all of its versions.
    fn delete_registered_model(&self, name: &str) -> Result<()>;

    /// Latest version per stage, restricted to `stages` when non-empty.
    fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>>;

    /// Create a model version. Registration may complete asynchronously.
    fn create_model_version(&self, name: &str, request: &NewModelVersion) -> Result<ModelVersion>;

    /// Get one model version.
    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion>;

    /// Move a version to `stage`.
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion>;

    /// Export a workspace notebook in `format`.
    fn export_notebook(&self, path: &str, format: NotebookFormat) -> Result<Vec<u8>> {
        let _ = (path, format);
        Err(Error::Unsupported(format!(
            "notebook export from {}",
            self.tracking_uri()
        )))
    }
}

/// Destination experiment of a run import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentTarget {
    /// Existing experiment id.
    Id(String),
    /// Experiment name; created when missing.
    Name(String),
}

impl ExperimentTarget {
    /// Target by id.
    #[must_use]
    pub fn id(experiment_id: impl Into<String>) -> Self {
        Self::Id(experiment_id.into())
    }

    /// Target by name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Resolve to an experiment on `client`, creating it by name if needed.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty id/name, [`Error::NotFound`] for
    /// an unknown id, or any client error.
    pub fn resolve(&self, client: &dyn TrackingClient) -> Result<Experiment> {
        match self {
            Self::Id(id) if id.is_empty() => {
                Err(Error::InvalidInput("experiment id is required".into()))
            }
            Self::Name(name) if name.is_empty() => {
                Err(Error::InvalidInput("experiment name is required".into()))
            }
            Self::Id(id) => client.get_experiment(id),
            Self::Name(name) => {
                if let Some(experiment) = client.get_experiment_by_name(name)? {
                    return Ok(experiment);
                }
                let id = client.create_experiment(name)?;
                tracing::info!(experiment_id = %id, name = %name, "created experiment");
                client.get_experiment(&id)
            }
        }
    }
}

impl From<&str> for ExperimentTarget {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}
