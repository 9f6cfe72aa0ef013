//! Registered model export and import
//!
//! A model export is a `model.json` plus one run export per selected
//! version. Importing replays each run under a new run id, points a new
//! model version at the new run's copy of the model artifacts, waits for
//! the registry to finish registration and re-applies the stage.
//!
//! ```text
//! source version (v4, run A, .../A/artifacts/model)
//!      │ export
//!      ▼
//! versions/4/{run.json, artifacts/}
//!      │ import
//!      ▼
//! run B ──> version v1 (source .../B/artifacts/model) ──> Production
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use mlflow_porter::client::{InMemoryTrackingServer, TrackingClient};
//! use mlflow_porter::entity::{NewModelVersion, Stage};
//! use mlflow_porter::model::{
//!     ModelExporter, ModelImportOptions, ModelImporter, ReadinessPolicy, VersionSelection,
//! };
//!
//! # fn main() -> mlflow_porter::Result<()> {
//! let source = InMemoryTrackingServer::new();
//! let run = source.create_run("0", 0, &Default::default())?;
//! source.create_registered_model("wine", "", &Default::default())?;
//! let model_source = format!("{}/model", run.info.artifact_uri);
//! let v = source.create_model_version("wine", &NewModelVersion::new(model_source, run.run_id()))?;
//! source.transition_model_version_stage("wine", v.version, Stage::Production, false)?;
//!
//! let dir = tempfile::tempdir()?;
//! ModelExporter::new(&source).export_model("wine", dir.path(), &VersionSelection::Current)?;
//!
//! let dest = InMemoryTrackingServer::new();
//! let options = ModelImportOptions::new()
//!     .with_readiness(ReadinessPolicy::new(Duration::from_millis(10), 5));
//! let report = ModelImporter::new(&dest)
//!     .with_options(options)
//!     .import_model("wine", dir.path(), "wine-imported")?;
//! assert!(report.is_complete());
//! assert_eq!(report.model.latest_versions[0].current_stage, Stage::Production);
//! # Ok(())
//! # }
//! ```

mod export;
mod import;
mod manifest;
pub mod readiness;

pub use export::{ModelExporter, VersionSelection};
pub use import::{
    extract_model_path, ImportedVersion, ModelImportOptions, ModelImportReport, ModelImporter,
    SourceFlavor, VersionImportOutcome,
};
pub use manifest::{ModelManifest, VersionRecord, MODEL_MANIFEST, VERSIONS_DIR};
pub use readiness::{
    wait_until_ready, ReadinessPolicy, Sleeper, ThreadSleeper, VersionState, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL,
};
