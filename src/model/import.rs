//! Model Importer: recreate a registered model and rebind its versions

use std::path::Path;

use super::manifest::{ModelManifest, VersionRecord};
use super::readiness::{wait_until_ready, ReadinessPolicy, Sleeper, ThreadSleeper};
use crate::client::{ExperimentTarget, TrackingClient};
use crate::entity::{NewModelVersion, RegisteredModel, Stage};
use crate::run::RunImporter;
use crate::{Error, Result};

/// Layout of a model version `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFlavor {
    /// `dbfs:/databricks/mlflow-tracking/<exp>/<run_id>/artifacts/<path>`
    Databricks,
    /// `runs:/<run_id>/<path>`, relative to the run's artifact root
    RunsUri,
    /// `<mlruns root>/<exp>/<run_id>/artifacts/<path>` (local, `file:`,
    /// `mlflow-artifacts:` or object-store roots)
    Oss,
}

impl SourceFlavor {
    /// Flavor of `source`.
    #[must_use]
    pub fn detect(source: &str) -> Self {
        if source.starts_with("dbfs:/databricks/mlflow-tracking/") {
            Self::Databricks
        } else if source.starts_with("runs:/") {
            Self::RunsUri
        } else {
            Self::Oss
        }
    }

    /// Text following the `run_id` path segment of `source`.
    ///
    /// A `runs:/` URI must name the run in its first segment; the artifact
    /// store layouts may embed it at any depth.
    fn after_run_segment<'a>(self, source: &'a str, run_id: &str) -> Option<&'a str> {
        match self {
            Self::RunsUri => source
                .strip_prefix("runs:/")?
                .strip_prefix(run_id)
                .filter(|rest| rest.is_empty() || rest.starts_with('/')),
            Self::Databricks | Self::Oss => source.match_indices(run_id).find_map(|(at, _)| {
                let rest = &source[at + run_id.len()..];
                let starts_segment = at == 0 || source[..at].ends_with('/');
                let ends_segment = rest.is_empty() || rest.starts_with('/');
                (starts_segment && ends_segment).then_some(rest)
            }),
        }
    }
}

/// Model artifact path of `source`, relative to the artifact root of
/// `run_id`.
///
/// Everything after the `run_id` path segment is kept verbatim, minus a
/// leading `artifacts` segment when one is present.
///
/// ```rust
/// use mlflow_porter::model::extract_model_path;
///
/// let run_id = "48cf29167ddb4e098da780f0959fb4cf";
/// let source = format!("dbfs:/databricks/mlflow-tracking/4072937019901104/{run_id}/artifacts/models:/my_model");
/// assert_eq!(extract_model_path(&source, run_id).unwrap(), "models:/my_model");
/// assert_eq!(extract_model_path(&format!("runs:/{run_id}/model"), run_id).unwrap(), "model");
/// ```
///
/// # Errors
///
/// Returns [`Error::UnrecognizedSourcePath`] when `run_id` is not a path
/// segment of `source`.
pub fn extract_model_path(source: &str, run_id: &str) -> Result<String> {
    if run_id.is_empty() || run_id.contains('/') {
        return Err(Error::UnrecognizedSourcePath {
            source_path: source.to_string(),
            run_id: run_id.to_string(),
        });
    }
    let rest = SourceFlavor::detect(source)
        .after_run_segment(source, run_id)
        .ok_or_else(|| Error::UnrecognizedSourcePath {
            source_path: source.to_string(),
            run_id: run_id.to_string(),
        })?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let path = match rest.strip_prefix("artifacts") {
        Some("") => "",
        Some(under) => under.strip_prefix('/').unwrap_or(rest),
        None => rest,
    };
    Ok(path.to_string())
}

/// Options of a model import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelImportOptions {
    delete_model: bool,
    readiness: ReadinessPolicy,
}

impl ModelImportOptions {
    /// Defaults: keep an existing model (conflict), default polling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a same-named destination model before importing.
    #[must_use]
    pub const fn with_delete_model(mut self, delete_model: bool) -> Self {
        self.delete_model = delete_model;
        self
    }

    /// Readiness polling schedule.
    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Whether an existing model is deleted first.
    #[must_use]
    pub const fn delete_model(&self) -> bool {
        self.delete_model
    }

    /// Readiness polling schedule.
    #[must_use]
    pub const fn readiness(&self) -> &ReadinessPolicy {
        &self.readiness
    }
}

/// A successfully imported version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedVersion {
    /// Version number assigned by the destination
    pub version: u32,
    /// Run id assigned by the destination
    pub run_id: String,
    /// Source the new version points at
    pub source: String,
    /// Stage applied
    pub stage: Stage,
}

/// Outcome of one source version.
#[derive(Debug)]
pub struct VersionImportOutcome {
    /// Source version number
    pub source_version: u32,
    /// New version, or why it failed
    pub result: Result<ImportedVersion>,
}

/// Result of a model import.
#[derive(Debug)]
pub struct ModelImportReport {
    /// Destination model, re-read after all versions were processed
    pub model: RegisteredModel,
    /// One outcome per manifest version, in manifest order
    pub versions: Vec<VersionImportOutcome>,
}

impl ModelImportReport {
    /// Whether every version imported.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.versions.iter().all(|v| v.result.is_ok())
    }

    /// Versions that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (u32, &Error)> {
        self.versions
            .iter()
            .filter_map(|v| v.result.as_ref().err().map(|e| (v.source_version, e)))
    }

    /// `(source version, destination version)` of every imported version.
    #[must_use]
    pub fn version_pairs(&self) -> Vec<(u32, u32)> {
        self.versions
            .iter()
            .filter_map(|v| v.result.as_ref().ok().map(|new| (v.source_version, new.version)))
            .collect()
    }
}

/// Imports exported registered models.
pub struct ModelImporter<'a> {
    client: &'a dyn TrackingClient,
    options: ModelImportOptions,
    sleeper: &'a dyn Sleeper,
}

impl<'a> ModelImporter<'a> {
    /// Importer with default options, sleeping on the current thread.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            client,
            options: ModelImportOptions::default(),
            sleeper: &ThreadSleeper,
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: ModelImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the sleeper used between readiness polls.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Import the model exported under `input_dir` as `model_name`, placing
    /// version runs in `experiment_name`.
    ///
    /// Failures of individual versions are recorded in the report and do
    /// not stop the remaining versions.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for empty names or a missing `model.json`
    /// - [`Error::AlreadyExists`] when the model exists and deletion was
    ///   not requested
    /// - client errors while deleting, creating or re-reading the model
    pub fn import_model(
        &self,
        model_name: &str,
        input_dir: &Path,
        experiment_name: &str,
    ) -> Result<ModelImportReport> {
        if model_name.trim().is_empty() {
            return Err(Error::InvalidInput("model name is required".into()));
        }
        if experiment_name.trim().is_empty() {
            return Err(Error::InvalidInput("experiment name is required".into()));
        }
        let manifest = ModelManifest::read(input_dir)?;
        let _span = tracing::info_span!("import_model", model = model_name).entered();

        self.prepare_destination(model_name)?;
        self.client
            .create_registered_model(model_name, &manifest.description, &manifest.tags)?;

        let target = ExperimentTarget::name(experiment_name);
        let versions = manifest
            .versions
            .iter()
            .map(|record| {
                let result = self.import_version(model_name, input_dir, &target, record);
                match &result {
                    Ok(new) => tracing::info!(
                        source_version = record.version,
                        version = new.version,
                        stage = %new.stage,
                        "imported model version"
                    ),
                    Err(err) => tracing::warn!(
                        source_version = record.version,
                        error = %err,
                        "model version import failed"
                    ),
                }
                VersionImportOutcome {
                    source_version: record.version,
                    result,
                }
            })
            .collect();

        Ok(ModelImportReport {
            model: self.client.get_registered_model(model_name)?,
            versions,
        })
    }

    fn prepare_destination(&self, model_name: &str) -> Result<()> {
        match self.client.get_registered_model(model_name) {
            Ok(_) if self.options.delete_model => {
                self.client.delete_registered_model(model_name)?;
                tracing::info!(model = model_name, "deleted existing model");
                Ok(())
            }
            Ok(_) => Err(Error::AlreadyExists(format!("registered model '{model_name}'"))),
            Err(Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn import_version(
        &self,
        model_name: &str,
        input_dir: &Path,
        target: &ExperimentTarget,
        record: &VersionRecord,
    ) -> Result<ImportedVersion> {
        let model_path = extract_model_path(&record.source, &record.run_id)?;
        tracing::debug!(
            flavor = ?SourceFlavor::detect(&record.source),
            model_path = %model_path,
            "resolved model path"
        );

        let run = RunImporter::new(self.client).import_run(&record.run_dir(input_dir), target)?;
        let source = if model_path.is_empty() {
            run.info.artifact_uri.clone()
        } else {
            format!("{}/{model_path}", run.info.artifact_uri.trim_end_matches('/'))
        };

        let request = NewModelVersion::new(source.clone(), run.run_id())
            .with_description(record.description.clone())
            .with_tags(record.tags.clone());
        let created = self.client.create_model_version(model_name, &request)?;
        wait_until_ready(
            self.client,
            model_name,
            created.version,
            &self.options.readiness,
            self.sleeper,
        )?;

        if record.stage != Stage::None {
            self.client
                .transition_model_version_stage(model_name, created.version, record.stage, false)?;
        }

        Ok(ImportedVersion {
            version: created.version,
            run_id: run.info.run_id,
            source,
            stage: record.stage,
        })
    }
}
