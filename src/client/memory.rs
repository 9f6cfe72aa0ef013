//! In-memory tracking server and model registry using `DashMap`.
//!
//! Data is lost when the value is dropped. Behaves like an MLflow server
//! for everything the export/import engine touches, plus knobs that real
//! servers only exhibit under load or misconfiguration:
//!
//! - artifact URI flavor (OSS `mlruns` layout or Databricks DBFS layout)
//! - asynchronous model-version registration (`with_registration_delay`)
//! - versions that never become ready or fail registration
//! - artifact download failures

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;
use walkdir::WalkDir;

use super::TrackingClient;
use crate::entity::{
    Experiment, FileInfo, Metric, ModelVersion, ModelVersionStatus, NewModelVersion,
    RegisteredModel, Run, RunData, RunInfo, RunStatus, Stage, TagSet, RUN_NAME_TAG,
};
use crate::run::NotebookFormat;
use crate::{Error, Result};

/// Layout of the artifact URIs the server hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactFlavor {
    /// `<root>/<experiment_id>/<run_id>/artifacts`
    Oss {
        /// Root of the `mlruns` tree
        root: String,
    },
    /// `dbfs:/databricks/mlflow-tracking/<experiment_id>/<run_id>/artifacts`
    Databricks,
}

impl ArtifactFlavor {
    fn experiment_location(&self, experiment_id: &str) -> String {
        match self {
            Self::Oss { root } => format!("{root}/{experiment_id}"),
            Self::Databricks => format!("dbfs:/databricks/mlflow-tracking/{experiment_id}"),
        }
    }

    fn run_artifact_uri(&self, experiment_id: &str, run_id: &str) -> String {
        format!("{}/{run_id}/artifacts", self.experiment_location(experiment_id))
    }
}

impl Default for ArtifactFlavor {
    fn default() -> Self {
        Self::Oss {
            root: "/tmp/mlflow/mlruns".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Registration {
    Done,
    Pending(u32),
    Stalled,
    Failing,
}

#[derive(Debug)]
struct VersionEntry {
    version: ModelVersion,
    registration: Registration,
}

impl VersionEntry {
    /// One status poll: advance asynchronous registration.
    fn poll(&mut self) {
        match self.registration {
            Registration::Done | Registration::Stalled => {}
            Registration::Pending(0) => {
                self.version.status = ModelVersionStatus::Ready;
                self.registration = Registration::Done;
            }
            Registration::Pending(n) => self.registration = Registration::Pending(n - 1),
            Registration::Failing => {
                self.version.status = ModelVersionStatus::FailedRegistration;
                self.version.status_message = Some("Model artifacts could not be copied".into());
                self.registration = Registration::Done;
            }
        }
    }
}

#[derive(Debug)]
struct ModelEntry {
    model: RegisteredModel,
    versions: BTreeMap<u32, VersionEntry>,
    next_version: u32,
}

impl ModelEntry {
    fn latest(&self, stages: &[Stage]) -> Vec<ModelVersion> {
        let mut by_stage: BTreeMap<Stage, &ModelVersion> = BTreeMap::new();
        for entry in self.versions.values() {
            let stage = entry.version.current_stage;
            if stages.is_empty() || stages.contains(&stage) {
                by_stage.insert(stage, &entry.version);
            }
        }
        let mut latest: Vec<ModelVersion> = by_stage.into_values().cloned().collect();
        latest.sort_by_key(|v| v.version);
        latest
    }

    fn snapshot(&self) -> RegisteredModel {
        RegisteredModel {
            latest_versions: self.latest(&[]),
            ..self.model.clone()
        }
    }
}

/// In-memory MLflow tracking server and model registry.
///
/// # Example
///
/// ```rust
/// use mlflow_porter::client::{InMemoryTrackingServer, TrackingClient};
///
/// # fn main() -> mlflow_porter::Result<()> {
/// let server = InMemoryTrackingServer::databricks().with_registration_delay(2);
/// server.create_registered_model("wine", "", &Default::default())?;
/// assert!(server.is_databricks());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryTrackingServer {
    tracking_uri: String,
    flavor: ArtifactFlavor,
    user_id: String,
    registration_polls: u32,
    experiments: DashMap<String, Experiment>,
    runs: DashMap<String, Run>,
    artifacts: DashMap<String, BTreeMap<String, Vec<u8>>>,
    models: DashMap<String, ModelEntry>,
    notebooks: DashMap<String, String>,
    stalled: DashSet<(String, u32)>,
    failing: DashSet<(String, u32)>,
    failing_downloads: DashSet<String>,
    next_experiment_id: AtomicU64,
}

impl InMemoryTrackingServer {
    /// OSS-flavored server with the `Default` experiment (id `0`).
    #[must_use]
    pub fn new() -> Self {
        let server = Self {
            tracking_uri: "memory://mlflow".to_string(),
            flavor: ArtifactFlavor::default(),
            user_id: "mlflow-user".to_string(),
            registration_polls: 0,
            experiments: DashMap::new(),
            runs: DashMap::new(),
            artifacts: DashMap::new(),
            models: DashMap::new(),
            notebooks: DashMap::new(),
            stalled: DashSet::new(),
            failing: DashSet::new(),
            failing_downloads: DashSet::new(),
            next_experiment_id: AtomicU64::new(1),
        };
        server.experiments.insert(
            "0".to_string(),
            Experiment::builder("0", "Default")
                .artifact_location(server.flavor.experiment_location("0"))
                .build(),
        );
        server
    }

    /// Databricks-flavored server (`tracking_uri` is `databricks`).
    #[must_use]
    pub fn databricks() -> Self {
        Self::new()
            .with_tracking_uri("databricks")
            .with_flavor(ArtifactFlavor::Databricks)
    }

    /// Set the reported tracking URI.
    #[must_use]
    pub fn with_tracking_uri(mut self, tracking_uri: impl Into<String>) -> Self {
        self.tracking_uri = tracking_uri.into();
        self
    }

    /// Set the artifact URI layout.
    #[must_use]
    pub fn with_flavor(mut self, flavor: ArtifactFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the user recorded on new runs and versions.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Number of `get_model_version` polls a new version stays pending.
    #[must_use]
    pub const fn with_registration_delay(mut self, polls: u32) -> Self {
        self.registration_polls = polls;
        self
    }

    /// Keep version `version` of `model` pending forever once created.
    pub fn stall_registration(&self, model: &str, version: u32) {
        self.stalled.insert((model.to_string(), version));
    }

    /// Make version `version` of `model` fail registration once created.
    pub fn fail_registration(&self, model: &str, version: u32) {
        self.failing.insert((model.to_string(), version));
    }

    /// Make artifact downloads of `run_id` fail.
    pub fn fail_downloads_for(&self, run_id: &str) {
        self.failing_downloads.insert(run_id.to_string());
    }

    /// Store a workspace notebook for `export_notebook`.
    pub fn add_notebook(&self, path: &str, source: &str) {
        self.notebooks.insert(path.to_string(), source.to_string());
    }

    /// Store an artifact file directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown run.
    pub fn put_artifact(&self, run_id: &str, path: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_run(run_id)?;
        self.artifacts
            .entry(run_id.to_string())
            .or_default()
            .insert(normalize(path), bytes.to_vec());
        Ok(())
    }

    /// Bytes of one artifact file, if present.
    #[must_use]
    pub fn artifact(&self, run_id: &str, path: &str) -> Option<Vec<u8>> {
        self.artifacts
            .get(run_id)
            .and_then(|files| files.get(&normalize(path)).cloned())
    }

    /// Every version of `model`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown model.
    pub fn all_versions(&self, model: &str) -> Result<Vec<ModelVersion>> {
        let entry = self
            .models
            .get(model)
            .ok_or_else(|| Error::not_found("registered model", model))?;
        Ok(entry.versions.values().map(|v| v.version.clone()).collect())
    }

    /// Number of runs on the server.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    fn ensure_run(&self, run_id: &str) -> Result<()> {
        if self.runs.contains_key(run_id) {
            Ok(())
        } else {
            Err(Error::not_found("run", run_id))
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl Default for InMemoryTrackingServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Artifact keys are `/`-separated, without leading/trailing separators.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn is_under(prefix: &str, key: &str) -> bool {
    prefix.is_empty()
        || key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn local_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

impl TrackingClient for InMemoryTrackingServer {
    fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::not_found("experiment", experiment_id))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .experiments
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.value().clone()))
    }

    fn create_experiment(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::InvalidInput("experiment name is required".into()));
        }
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::AlreadyExists(format!("experiment '{name}'")));
        }
        let id = self.next_experiment_id.fetch_add(1, Ordering::SeqCst).to_string();
        let experiment = Experiment::builder(id.clone(), name)
            .artifact_location(self.flavor.experiment_location(&id))
            .build();
        self.experiments.insert(id.clone(), experiment);
        Ok(id)
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::not_found("run", run_id))
    }

    fn create_run(&self, experiment_id: &str, start_time: i64, tags: &TagSet) -> Result<Run> {
        self.get_experiment(experiment_id)?;
        let run_id = Uuid::new_v4().simple().to_string();

        let mut info = RunInfo::new(
            run_id.clone(),
            experiment_id,
            self.flavor.run_artifact_uri(experiment_id, &run_id),
        );
        info.user_id.clone_from(&self.user_id);
        info.start_time = start_time;
        info.run_name = tags.get(RUN_NAME_TAG).cloned();

        let mut data = RunData {
            tags: tags.clone(),
            ..RunData::default()
        };
        data.tags
            .entry("mlflow.user".to_string())
            .or_insert_with(|| self.user_id.clone());

        let run = Run { info, data };
        self.runs.insert(run_id.clone(), run.clone());
        self.artifacts.insert(run_id, BTreeMap::new());
        Ok(run)
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::not_found("run", run_id))?;
        match run.data.params.get(key) {
            Some(existing) if existing != value => Err(Error::ParamConflict {
                run_id: run_id.to_string(),
                key: key.to_string(),
                existing: existing.clone(),
                attempted: value.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                run.data.params.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::not_found("run", run_id))?;
        let newer = run
            .data
            .metrics
            .get(metric.key())
            .map_or(true, |current| {
                (metric.step(), metric.timestamp()) >= (current.step(), current.timestamp())
            });
        if newer {
            run.data
                .metrics
                .insert(metric.key().to_string(), metric.clone());
        }
        Ok(())
    }

    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::not_found("run", run_id))?;
        if key == RUN_NAME_TAG {
            run.info.run_name = Some(value.to_string());
        }
        run.data.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: Option<i64>) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::not_found("run", run_id))?;
        run.info.status = status;
        run.info.end_time = Some(end_time.unwrap_or_else(Self::now_ms));
        Ok(())
    }

    fn list_artifacts(&self, run_id: &str, path: Option<&str>) -> Result<Vec<FileInfo>> {
        self.ensure_run(run_id)?;
        let prefix = normalize(path.unwrap_or_default());
        let Some(files) = self.artifacts.get(run_id) else {
            return Ok(Vec::new());
        };

        let mut children: BTreeMap<String, FileInfo> = BTreeMap::new();
        for (key, bytes) in files.iter().filter(|(key, _)| is_under(&prefix, key)) {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                key.get(prefix.len() + 1..).unwrap_or_default()
            };
            if rest.is_empty() {
                continue;
            }
            let (head, is_dir) = rest
                .split_once('/')
                .map_or((rest, false), |(head, _)| (head, true));
            let child = if prefix.is_empty() {
                head.to_string()
            } else {
                format!("{prefix}/{head}")
            };
            let info = if is_dir {
                FileInfo::dir(child.clone())
            } else {
                FileInfo::file(child.clone(), bytes.len() as u64)
            };
            children.entry(child).or_insert(info);
        }
        Ok(children.into_values().collect())
    }

    fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf> {
        self.ensure_run(run_id)?;
        if self.failing_downloads.contains(run_id) {
            return Err(Error::Transport(format!(
                "download of artifacts for run {run_id} failed"
            )));
        }
        let prefix = normalize(path);
        let files: Vec<(String, Vec<u8>)> = self
            .artifacts
            .get(run_id)
            .map(|files| {
                files
                    .iter()
                    .filter(|(key, _)| is_under(&prefix, key))
                    .map(|(key, bytes)| (key.clone(), bytes.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if files.is_empty() && !prefix.is_empty() {
            return Err(Error::not_found("artifact", format!("{run_id}/{prefix}")));
        }

        fs::create_dir_all(dst)?;
        for (key, bytes) in files {
            let target = local_path(dst, &key);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, bytes)?;
        }
        Ok(local_path(dst, &prefix))
    }

    fn log_artifacts(
        &self,
        run_id: &str,
        local_dir: &Path,
        artifact_path: Option<&str>,
    ) -> Result<()> {
        self.ensure_run(run_id)?;
        let base = normalize(artifact_path.unwrap_or_default());
        let mut uploaded = BTreeMap::new();
        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| Error::Transport(e.to_string()))?;
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let key = if base.is_empty() {
                relative
            } else {
                format!("{base}/{relative}")
            };
            uploaded.insert(key, fs::read(entry.path())?);
        }
        self.artifacts
            .entry(run_id.to_string())
            .or_default()
            .extend(uploaded);
        Ok(())
    }

    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        self.models
            .get(name)
            .map(|entry| entry.snapshot())
            .ok_or_else(|| Error::not_found("registered model", name))
    }

    fn create_registered_model(
        &self,
        name: &str,
        description: &str,
        tags: &TagSet,
    ) -> Result<RegisteredModel> {
        if name.is_empty() {
            return Err(Error::InvalidInput("registered model name is required".into()));
        }
        match self.models.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("registered model '{name}'"))),
            Entry::Vacant(slot) => {
                let model = RegisteredModel {
                    name: name.to_string(),
                    description: description.to_string(),
                    tags: tags.clone(),
                    latest_versions: Vec::new(),
                };
                slot.insert(ModelEntry {
                    model: model.clone(),
                    versions: BTreeMap::new(),
                    next_version: 1,
                });
                Ok(model)
            }
        }
    }

    fn delete_registered_model(&self, name: &str) -> Result<()> {
        self.models
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("registered model", name))
    }

    fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>> {
        self.models
            .get(name)
            .map(|entry| entry.latest(stages))
            .ok_or_else(|| Error::not_found("registered model", name))
    }

    fn create_model_version(&self, name: &str, request: &NewModelVersion) -> Result<ModelVersion> {
        if !request.run_id.is_empty() {
            self.ensure_run(&request.run_id)?;
        }
        let mut entry = self
            .models
            .get_mut(name)
            .ok_or_else(|| Error::not_found("registered model", name))?;

        let number = entry.next_version;
        entry.next_version += 1;

        let mut version = ModelVersion::new(name, number, &request.source, &request.run_id);
        version.description.clone_from(&request.description);
        version.tags.clone_from(&request.tags);
        version.user_id = Some(self.user_id.clone());

        let key = (name.to_string(), number);
        let registration = if self.stalled.contains(&key) {
            Registration::Stalled
        } else if self.failing.contains(&key) {
            Registration::Failing
        } else if self.registration_polls == 0 {
            version.status = ModelVersionStatus::Ready;
            Registration::Done
        } else {
            Registration::Pending(self.registration_polls)
        };

        entry.versions.insert(
            number,
            VersionEntry {
                version: version.clone(),
                registration,
            },
        );
        Ok(version)
    }

    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let mut entry = self
            .models
            .get_mut(name)
            .ok_or_else(|| Error::not_found("registered model", name))?;
        let slot = entry
            .versions
            .get_mut(&version)
            .ok_or_else(|| Error::not_found("model version", format!("{name}/{version}")))?;
        slot.poll();
        Ok(slot.version.clone())
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion> {
        let mut entry = self
            .models
            .get_mut(name)
            .ok_or_else(|| Error::not_found("registered model", name))?;
        if !entry.versions.contains_key(&version) {
            return Err(Error::not_found("model version", format!("{name}/{version}")));
        }
        if archive_existing_versions && matches!(stage, Stage::Staging | Stage::Production) {
            for other in entry.versions.values_mut() {
                if other.version.version != version && other.version.current_stage == stage {
                    other.version.current_stage = Stage::Archived;
                }
            }
        }
        let slot = entry
            .versions
            .get_mut(&version)
            .ok_or_else(|| Error::not_found("model version", format!("{name}/{version}")))?;
        slot.version.current_stage = stage;
        Ok(slot.version.clone())
    }

    fn export_notebook(&self, path: &str, format: NotebookFormat) -> Result<Vec<u8>> {
        let source = self
            .notebooks
            .get(path)
            .map(|s| s.value().clone())
            .ok_or_else(|| Error::not_found("notebook", path))?;
        let rendered = match format {
            NotebookFormat::Source => source,
            NotebookFormat::Html => format!("<html><body><pre>{source}</pre></body></html>"),
            NotebookFormat::Jupyter => serde_json::json!({
                "nbformat": 4,
                "nbformat_minor": 0,
                "metadata": {},
                "cells": [{ "cell_type": "code", "metadata": {}, "source": [source] }],
            })
            .to_string(),
            NotebookFormat::Dbc => format!("DBC\n{source}"),
        };
        Ok(rendered.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_with_run() -> (InMemoryTrackingServer, String) {
        let server = InMemoryTrackingServer::new();
        let exp = server.create_experiment("wine").unwrap();
        let run = server.create_run(&exp, 1000, &TagSet::new()).unwrap();
        (server, run.info.run_id)
    }

    #[test]
    fn test_run_artifact_uri_flavors() {
        let oss = InMemoryTrackingServer::new();
        let run = oss.create_run("0", 0, &TagSet::new()).unwrap();
        assert_eq!(
            run.info.artifact_uri,
            format!("/tmp/mlflow/mlruns/0/{}/artifacts", run.info.run_id)
        );

        let dbx = InMemoryTrackingServer::databricks();
        let run = dbx.create_run("0", 0, &TagSet::new()).unwrap();
        assert!(run
            .info
            .artifact_uri
            .starts_with("dbfs:/databricks/mlflow-tracking/0/"));
        assert!(dbx.is_databricks());
        assert!(!oss.is_databricks());
    }

    #[test]
    fn test_param_conflict() {
        let (server, run_id) = server_with_run();
        server.log_param(&run_id, "alpha", "0.5").unwrap();
        server.log_param(&run_id, "alpha", "0.5").unwrap();
        let err = server.log_param(&run_id, "alpha", "0.7").unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_log_metric_keeps_latest_step() {
        let (server, run_id) = server_with_run();
        server
            .log_metric(&run_id, &Metric::builder("loss", 0.5).step(2).build())
            .unwrap();
        server
            .log_metric(&run_id, &Metric::builder("loss", 0.9).step(1).build())
            .unwrap();
        let run = server.get_run(&run_id).unwrap();
        assert!((run.data.metrics["loss"].value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_list_and_download_artifacts() {
        let (server, run_id) = server_with_run();
        server.put_artifact(&run_id, "plot.png", b"png").unwrap();
        server.put_artifact(&run_id, "model/model.pkl", b"pkl").unwrap();
        server.put_artifact(&run_id, "model/conda.yaml", b"yaml").unwrap();

        let root = server.list_artifacts(&run_id, None).unwrap();
        assert_eq!(root, vec![FileInfo::dir("model"), FileInfo::file("plot.png", 3)]);
        let model = server.list_artifacts(&run_id, Some("model")).unwrap();
        assert_eq!(model.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = server.download_artifacts(&run_id, "model", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("model"));
        assert_eq!(fs::read(dir.path().join("model/model.pkl")).unwrap(), b"pkl");
        assert!(!dir.path().join("plot.png").exists());

        let err = server.download_artifacts(&run_id, "missing", dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_log_artifacts_under_path() {
        let (server, run_id) = server_with_run();
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"a").unwrap();
        server.log_artifacts(&run_id, dir.path(), Some("data")).unwrap();
        assert_eq!(server.artifact(&run_id, "data/sub/a.txt"), Some(b"a".to_vec()));
    }

    #[test]
    fn test_registration_delay() {
        let server = InMemoryTrackingServer::new().with_registration_delay(2);
        let run = server.create_run("0", 0, &TagSet::new()).unwrap();
        server.create_registered_model("m", "", &TagSet::new()).unwrap();
        let source = format!("{}/model", run.info.artifact_uri);
        let v = server
            .create_model_version("m", &NewModelVersion::new(source, run.info.run_id))
            .unwrap();
        assert_eq!(v.status, ModelVersionStatus::PendingRegistration);
        let statuses: Vec<_> = (0..3)
            .map(|_| server.get_model_version("m", 1).unwrap().status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ModelVersionStatus::PendingRegistration,
                ModelVersionStatus::PendingRegistration,
                ModelVersionStatus::Ready
            ]
        );
    }

    #[test]
    fn test_latest_versions_per_stage() {
        let server = InMemoryTrackingServer::new();
        let run = server.create_run("0", 0, &TagSet::new()).unwrap();
        server.create_registered_model("m", "", &TagSet::new()).unwrap();
        for stage in [Stage::Production, Stage::None, Stage::Staging, Stage::Production] {
            let v = server
                .create_model_version("m", &NewModelVersion::new("s", run.info.run_id.clone()))
                .unwrap();
            server
                .transition_model_version_stage("m", v.version, stage, false)
                .unwrap();
        }
        let latest = server.get_latest_versions("m", &[]).unwrap();
        let numbers: Vec<u32> = latest.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![2, 3, 4]);

        let prod = server.get_latest_versions("m", &[Stage::Production]).unwrap();
        assert_eq!(prod.len(), 1);
        assert_eq!(prod[0].version, 4);
    }

    #[test]
    fn test_archive_existing_versions() {
        let server = InMemoryTrackingServer::new();
        let run = server.create_run("0", 0, &TagSet::new()).unwrap();
        server.create_registered_model("m", "", &TagSet::new()).unwrap();
        for _ in 0..2 {
            server
                .create_model_version("m", &NewModelVersion::new("s", run.info.run_id.clone()))
                .unwrap();
        }
        server.transition_model_version_stage("m", 1, Stage::Production, false).unwrap();
        server.transition_model_version_stage("m", 2, Stage::Production, true).unwrap();
        assert_eq!(server.get_model_version("m", 1).unwrap().current_stage, Stage::Archived);
    }

    #[test]
    fn test_duplicate_model() {
        let server = InMemoryTrackingServer::new();
        server.create_registered_model("m", "", &TagSet::new()).unwrap();
        let err = server.create_registered_model("m", "", &TagSet::new()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        server.delete_registered_model("m").unwrap();
        assert!(server.get_registered_model("m").is_err());
    }
}
