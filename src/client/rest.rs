//! MLflow REST API 2.0 client (blocking)
//!
//! Covers exactly the [`TrackingClient`] capability set. Artifact transfer
//! depends on where the run's artifact root lives:
//!
//! - `mlflow-artifacts:/...`: proxied through the tracking server
//! - `dbfs:/...`: Databricks DBFS API (base64 blocks)
//! - `/...` or `file:/...`: a filesystem shared with the server
//! - anything else: downloads go through the server's `get-artifact`
//!   endpoint; uploads are unsupported

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::TrackingClient;
use crate::config::ClientConfig;
use crate::entity::{
    Experiment, FileInfo, LifecycleStage, Metric, ModelVersion, NewModelVersion, RegisteredModel,
    Run, RunData, RunInfo, RunStatus, Stage, TagSet, RUN_NAME_TAG,
};
use crate::run::NotebookFormat;
use crate::{Error, Result};

const API: &str = "/api/2.0/mlflow";
const DBFS_BLOCK: usize = 512 * 1024;

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_i64<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            Self::Int(v) => Ok(v),
            Self::Str(s) => s.parse().map_err(E::custom),
        }
    }
}

// Proto int64 fields arrive as numbers from OSS servers and as strings from
// some Databricks endpoints.
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    IntOrString::deserialize(d)?.into_i64()
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Option::<IntOrString>::deserialize(d)?
        .map(IntOrString::into_i64)
        .transpose()
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    let v = IntOrString::deserialize(d)?.into_i64()?;
    u32::try_from(v).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct WireExperiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    artifact_location: String,
    #[serde(default)]
    lifecycle_stage: LifecycleStage,
    #[serde(default)]
    tags: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct WireRunInfo {
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: Option<String>,
    #[serde(default)]
    user_id: String,
    status: RunStatus,
    #[serde(default, deserialize_with = "lenient_i64")]
    start_time: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
    #[serde(default)]
    lifecycle_stage: LifecycleStage,
}

#[derive(Debug, Deserialize)]
struct WireMetric {
    key: String,
    value: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    timestamp: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    step: i64,
}

#[derive(Debug, Default, Deserialize)]
struct WireRunData {
    #[serde(default)]
    metrics: Vec<WireMetric>,
    #[serde(default)]
    params: Vec<KeyValue>,
    #[serde(default)]
    tags: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    info: WireRunInfo,
    #[serde(default)]
    data: WireRunData,
}

#[derive(Debug, Deserialize)]
struct WireFileInfo {
    path: String,
    #[serde(default)]
    is_dir: bool,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireModelVersion {
    name: String,
    #[serde(deserialize_with = "lenient_u32")]
    version: u32,
    #[serde(default)]
    current_stage: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    tags: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct WireRegisteredModel {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<KeyValue>,
    #[serde(default)]
    latest_versions: Vec<WireModelVersion>,
}

#[derive(Deserialize)]
struct ExperimentEnvelope {
    experiment: WireExperiment,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct RunEnvelope {
    run: WireRun,
}

#[derive(Deserialize)]
struct ListArtifactsResponse {
    #[serde(default)]
    files: Vec<WireFileInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct RegisteredModelEnvelope {
    registered_model: WireRegisteredModel,
}

#[derive(Deserialize)]
struct LatestVersionsResponse {
    #[serde(default)]
    model_versions: Vec<WireModelVersion>,
}

#[derive(Deserialize)]
struct ModelVersionEnvelope {
    model_version: WireModelVersion,
}

#[derive(Deserialize)]
struct DbfsRead {
    #[serde(default)]
    bytes_read: i64,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
struct DbfsHandle {
    handle: i64,
}

#[derive(Deserialize)]
struct WorkspaceExport {
    #[serde(default)]
    content: String,
}

fn to_key_values(tags: &TagSet) -> Vec<KeyValue> {
    tags.iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

fn from_key_values(pairs: Vec<KeyValue>) -> TagSet {
    pairs.into_iter().map(|kv| (kv.key, kv.value)).collect()
}

impl From<WireExperiment> for Experiment {
    fn from(wire: WireExperiment) -> Self {
        let mut builder = Self::builder(wire.experiment_id, wire.name)
            .artifact_location(wire.artifact_location)
            .lifecycle_stage(wire.lifecycle_stage);
        for kv in wire.tags {
            builder = builder.tag(kv.key, kv.value);
        }
        builder.build()
    }
}

impl From<WireRun> for Run {
    fn from(wire: WireRun) -> Self {
        let info = RunInfo {
            run_id: wire.info.run_id,
            experiment_id: wire.info.experiment_id,
            run_name: wire.info.run_name,
            user_id: wire.info.user_id,
            status: wire.info.status,
            start_time: wire.info.start_time,
            end_time: wire.info.end_time,
            artifact_uri: wire.info.artifact_uri,
            lifecycle_stage: wire.info.lifecycle_stage,
        };
        let data = RunData {
            params: from_key_values(wire.data.params),
            metrics: wire
                .data
                .metrics
                .into_iter()
                .map(|m| {
                    let metric = Metric::builder(m.key.clone(), m.value)
                        .timestamp(m.timestamp)
                        .step(m.step)
                        .build();
                    (m.key, metric)
                })
                .collect(),
            tags: from_key_values(wire.data.tags),
        };
        Self { info, data }
    }
}

impl From<WireModelVersion> for ModelVersion {
    fn from(wire: WireModelVersion) -> Self {
        Self {
            name: wire.name,
            version: wire.version,
            current_stage: wire
                .current_stage
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            status: wire
                .status
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            status_message: wire.status_message.filter(|m| !m.is_empty()),
            user_id: wire.user_id.filter(|u| !u.is_empty()),
            run_id: wire.run_id,
            source: wire.source,
            tags: from_key_values(wire.tags),
        }
    }
}

impl From<WireRegisteredModel> for RegisteredModel {
    fn from(wire: WireRegisteredModel) -> Self {
        let mut latest_versions: Vec<ModelVersion> =
            wire.latest_versions.into_iter().map(Into::into).collect();
        latest_versions.sort_by_key(|v| v.version);
        Self {
            name: wire.name,
            description: wire.description.unwrap_or_default(),
            tags: from_key_values(wire.tags),
            latest_versions,
        }
    }
}

// ============================================================================
// Artifact locations
// ============================================================================

/// Where a run's artifact root physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtifactLocation {
    /// Path below `/api/2.0/mlflow-artifacts/artifacts/`
    Proxied(String),
    /// Absolute DBFS path
    Dbfs(String),
    /// Local filesystem path
    Local(PathBuf),
    /// Only reachable through the server's `get-artifact` endpoint
    Server,
}

impl ArtifactLocation {
    fn parse(artifact_uri: &str) -> Self {
        if let Some(rest) = artifact_uri.strip_prefix("mlflow-artifacts:") {
            // `mlflow-artifacts://host:port/path` or `mlflow-artifacts:/path`
            let path = rest
                .strip_prefix("//")
                .map_or(rest, |authority| {
                    authority.find('/').map_or("", |idx| &authority[idx..])
                });
            Self::Proxied(path.trim_matches('/').to_string())
        } else if let Some(path) = artifact_uri.strip_prefix("dbfs:") {
            Self::Dbfs(format!("/{}", path.trim_start_matches('/')))
        } else if let Some(path) = artifact_uri.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else if let Some(path) = artifact_uri.strip_prefix("file:") {
            Self::Local(PathBuf::from(path))
        } else if artifact_uri.starts_with('/') {
            Self::Local(PathBuf::from(artifact_uri))
        } else {
            Self::Server
        }
    }
}

fn transport(err: impl std::fmt::Display) -> Error {
    Error::Transport(err.to_string())
}

fn local_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

fn check(response: Response, kind: &'static str, id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let parsed: ApiError = serde_json::from_str(&body).unwrap_or(ApiError {
        error_code: String::new(),
        message: body,
    });
    match parsed.error_code.as_str() {
        "RESOURCE_DOES_NOT_EXIST" => Err(Error::not_found(kind, id)),
        "RESOURCE_ALREADY_EXISTS" => Err(Error::AlreadyExists(format!("{kind} '{id}'"))),
        _ => Err(Error::Server {
            status: status.as_u16(),
            code: parsed.error_code,
            message: parsed.message,
        }),
    }
}

// ============================================================================
// Client
// ============================================================================

/// Blocking MLflow REST client.
///
/// # Example
///
/// ```rust,no_run
/// use mlflow_porter::client::{RestClient, TrackingClient};
/// use mlflow_porter::config::ClientConfig;
///
/// # fn main() -> mlflow_porter::Result<()> {
/// let config = ClientConfig::resolve("http://localhost:5000", None, None)?;
/// let client = RestClient::new(config)?;
/// let run = client.get_run("48cf29167ddb4e098da780f0959fb4cf")?;
/// println!("{}", run.info.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    config: ClientConfig,
    http: Client,
}

impl RestClient {
    /// Create a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Create a client from `MLFLOW_TRACKING_URI` and related variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{endpoint}", self.config.host));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let response = check(builder.send()?, kind, id)?;
        Ok(response.json()?)
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let builder = self.request(Method::GET, &format!("{API}{endpoint}")).query(query);
        self.send(builder, kind, id)
    }

    fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let builder = self.request(Method::POST, &format!("{API}{endpoint}")).json(body);
        self.send(builder, kind, id)
    }

    fn list_page(&self, run_id: &str, path: Option<&str>, page_token: Option<&str>) -> Result<ListArtifactsResponse> {
        let mut query = vec![("run_id", run_id)];
        if let Some(path) = path {
            query.push(("path", path));
        }
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        self.get("/artifacts/list", &query, "run", run_id)
    }

    fn read_artifact(&self, run: &RunInfo, key: &str) -> Result<Vec<u8>> {
        match ArtifactLocation::parse(&run.artifact_uri) {
            ArtifactLocation::Proxied(root) => {
                let endpoint = format!("/api/2.0/mlflow-artifacts/artifacts/{root}/{key}");
                let response = self.request(Method::GET, &endpoint).send().map_err(transport)?;
                let response = check(response, "artifact", key)?;
                Ok(response.bytes().map_err(transport)?.to_vec())
            }
            ArtifactLocation::Dbfs(root) => self.dbfs_read(&format!("{root}/{key}")),
            ArtifactLocation::Local(root) => fs::read(local_path(&root, key)).map_err(transport),
            ArtifactLocation::Server => {
                let response = self
                    .request(Method::GET, "/get-artifact")
                    .query(&[("path", key), ("run_uuid", run.run_id.as_str())])
                    .send()
                    .map_err(transport)?;
                let response = check(response, "artifact", key)?;
                Ok(response.bytes().map_err(transport)?.to_vec())
            }
        }
    }

    fn write_artifact(&self, run: &RunInfo, key: &str, bytes: Vec<u8>) -> Result<()> {
        match ArtifactLocation::parse(&run.artifact_uri) {
            ArtifactLocation::Proxied(root) => {
                let endpoint = format!("/api/2.0/mlflow-artifacts/artifacts/{root}/{key}");
                let response = self
                    .request(Method::PUT, &endpoint)
                    .body(bytes)
                    .send()
                    .map_err(transport)?;
                check(response, "artifact", key).map(|_| ())
            }
            ArtifactLocation::Dbfs(root) => self.dbfs_put(&format!("{root}/{key}"), &bytes),
            ArtifactLocation::Local(root) => {
                let target = local_path(&root, key);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(transport)?;
                }
                fs::write(target, bytes).map_err(transport)
            }
            ArtifactLocation::Server => Err(Error::Unsupported(format!(
                "artifact upload to '{}'",
                run.artifact_uri
            ))),
        }
    }

    fn dbfs_read(&self, path: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            let offset = bytes.len().to_string();
            let length = DBFS_BLOCK.to_string();
            let chunk: DbfsRead = self.send(
                self.request(Method::GET, "/api/2.0/dbfs/read").query(&[
                    ("path", path),
                    ("offset", offset.as_str()),
                    ("length", length.as_str()),
                ]),
                "artifact",
                path,
            )?;
            if chunk.bytes_read <= 0 {
                break;
            }
            bytes.extend(BASE64.decode(chunk.data).map_err(transport)?);
            if usize::try_from(chunk.bytes_read).unwrap_or(0) < DBFS_BLOCK {
                break;
            }
        }
        Ok(bytes)
    }

    fn dbfs_put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let handle: DbfsHandle = self.send(
            self.request(Method::POST, "/api/2.0/dbfs/create")
                .json(&json!({ "path": path, "overwrite": true })),
            "artifact",
            path,
        )?;
        for block in bytes.chunks(DBFS_BLOCK) {
            let _: Value = self.send(
                self.request(Method::POST, "/api/2.0/dbfs/add-block")
                    .json(&json!({ "handle": handle.handle, "data": BASE64.encode(block) })),
                "artifact",
                path,
            )?;
        }
        let _: Value = self.send(
            self.request(Method::POST, "/api/2.0/dbfs/close")
                .json(&json!({ "handle": handle.handle })),
            "artifact",
            path,
        )?;
        Ok(())
    }

    /// Every file below `path`, recursing into directories.
    fn walk_artifacts(&self, run_id: &str, path: &str) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_string()];
        while let Some(dir) = pending.pop() {
            let dir = (!dir.is_empty()).then_some(dir);
            for entry in self.list_artifacts(run_id, dir.as_deref())? {
                if entry.is_dir {
                    pending.push(entry.path);
                } else {
                    files.push(entry);
                }
            }
        }
        Ok(files)
    }
}

impl TrackingClient for RestClient {
    fn tracking_uri(&self) -> &str {
        &self.config.tracking_uri
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        let envelope: ExperimentEnvelope = self.get(
            "/experiments/get",
            &[("experiment_id", experiment_id)],
            "experiment",
            experiment_id,
        )?;
        Ok(envelope.experiment.into())
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        match self.get::<ExperimentEnvelope>(
            "/experiments/get-by-name",
            &[("experiment_name", name)],
            "experiment",
            name,
        ) {
            Ok(envelope) => Ok(Some(envelope.experiment.into())),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_experiment(&self, name: &str) -> Result<String> {
        let response: CreateExperimentResponse =
            self.post("/experiments/create", &json!({ "name": name }), "experiment", name)?;
        Ok(response.experiment_id)
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        let envelope: RunEnvelope = self.get("/runs/get", &[("run_id", run_id)], "run", run_id)?;
        Ok(envelope.run.into())
    }

    fn create_run(&self, experiment_id: &str, start_time: i64, tags: &TagSet) -> Result<Run> {
        let mut body = json!({
            "experiment_id": experiment_id,
            "start_time": start_time,
            "tags": to_key_values(tags),
        });
        if let Some(name) = tags.get(RUN_NAME_TAG) {
            body["run_name"] = json!(name);
        }
        let envelope: RunEnvelope = self.post("/runs/create", &body, "experiment", experiment_id)?;
        Ok(envelope.run.into())
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: Value = self.post(
            "/runs/log-parameter",
            &json!({ "run_id": run_id, "key": key, "value": value }),
            "run",
            run_id,
        )?;
        Ok(())
    }

    fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        let _: Value = self.post(
            "/runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": metric.key(),
                "value": metric.value(),
                "timestamp": metric.timestamp(),
                "step": metric.step(),
            }),
            "run",
            run_id,
        )?;
        Ok(())
    }

    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: Value = self.post(
            "/runs/set-tag",
            &json!({ "run_id": run_id, "key": key, "value": value }),
            "run",
            run_id,
        )?;
        Ok(())
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: Option<i64>) -> Result<()> {
        let mut body = json!({ "run_id": run_id, "status": status.as_str() });
        if let Some(end_time) = end_time {
            body["end_time"] = json!(end_time);
        }
        let _: Value = self.post("/runs/update", &body, "run", run_id)?;
        Ok(())
    }

    fn list_artifacts(&self, run_id: &str, path: Option<&str>) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(run_id, path, page_token.as_deref())?;
            files.extend(page.files.into_iter().map(|f| FileInfo {
                path: f.path,
                is_dir: f.is_dir,
                file_size: f.file_size.and_then(|s| u64::try_from(s).ok()),
            }));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf> {
        let run = self.get_run(run_id)?;
        let prefix = path.trim_matches('/').trim_start_matches('.').trim_matches('/');
        let mut files = self.walk_artifacts(run_id, prefix)?;
        if files.is_empty() && !prefix.is_empty() {
            // `path` may name a single file rather than a directory
            files.push(FileInfo::file(prefix, 0));
        }
        fs::create_dir_all(dst)?;
        for file in &files {
            let bytes = self.read_artifact(&run.info, &file.path)?;
            let target = local_path(dst, &file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, bytes)?;
        }
        tracing::debug!(run_id, files = files.len(), "downloaded artifacts");
        Ok(local_path(dst, prefix))
    }

    fn log_artifacts(
        &self,
        run_id: &str,
        local_dir: &Path,
        artifact_path: Option<&str>,
    ) -> Result<()> {
        let run = self.get_run(run_id)?;
        let base = artifact_path.unwrap_or_default().trim_matches('/');
        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(transport)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let key = if base.is_empty() {
                relative
            } else {
                format!("{base}/{relative}")
            };
            self.write_artifact(&run.info, &key, fs::read(entry.path())?)?;
        }
        Ok(())
    }

    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        let envelope: RegisteredModelEnvelope = self.get(
            "/registered-models/get",
            &[("name", name)],
            "registered model",
            name,
        )?;
        Ok(envelope.registered_model.into())
    }

    fn create_registered_model(
        &self,
        name: &str,
        description: &str,
        tags: &TagSet,
    ) -> Result<RegisteredModel> {
        let envelope: RegisteredModelEnvelope = self.post(
            "/registered-models/create",
            &json!({ "name": name, "description": description, "tags": to_key_values(tags) }),
            "registered model",
            name,
        )?;
        Ok(envelope.registered_model.into())
    }

    fn delete_registered_model(&self, name: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &format!("{API}/registered-models/delete"))
            .json(&json!({ "name": name }));
        let _: Value = self.send(builder, "registered model", name)?;
        Ok(())
    }

    fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>> {
        let stages: Vec<&str> = stages.iter().map(|s| s.as_str()).collect();
        let response: LatestVersionsResponse = self.post(
            "/registered-models/get-latest-versions",
            &json!({ "name": name, "stages": stages }),
            "registered model",
            name,
        )?;
        let mut versions: Vec<ModelVersion> =
            response.model_versions.into_iter().map(Into::into).collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    fn create_model_version(&self, name: &str, request: &NewModelVersion) -> Result<ModelVersion> {
        let envelope: ModelVersionEnvelope = self.post(
            "/model-versions/create",
            &json!({
                "name": name,
                "source": request.source,
                "run_id": request.run_id,
                "description": request.description,
                "tags": to_key_values(&request.tags),
            }),
            "registered model",
            name,
        )?;
        Ok(envelope.model_version.into())
    }

    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let version = version.to_string();
        let envelope: ModelVersionEnvelope = self.get(
            "/model-versions/get",
            &[("name", name), ("version", version.as_str())],
            "model version",
            &format!("{name}/{version}"),
        )?;
        Ok(envelope.model_version.into())
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion> {
        let envelope: ModelVersionEnvelope = self.post(
            "/model-versions/transition-stage",
            &json!({
                "name": name,
                "version": version.to_string(),
                "stage": stage.as_str(),
                "archive_existing_versions": archive_existing_versions,
            }),
            "model version",
            &format!("{name}/{version}"),
        )?;
        Ok(envelope.model_version.into())
    }

    fn export_notebook(&self, path: &str, format: NotebookFormat) -> Result<Vec<u8>> {
        if !self.is_databricks() {
            return Err(Error::Unsupported(format!(
                "notebook export from {}",
                self.config.tracking_uri
            )));
        }
        let export: WorkspaceExport = self.send(
            self.request(Method::GET, "/api/2.0/workspace/export")
                .query(&[("path", path), ("format", format.as_str())]),
            "notebook",
            path,
        )?;
        BASE64.decode(export.content).map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_location_parse() {
        assert_eq!(
            ArtifactLocation::parse("mlflow-artifacts:/1/abc/artifacts"),
            ArtifactLocation::Proxied("1/abc/artifacts".into())
        );
        assert_eq!(
            ArtifactLocation::parse("mlflow-artifacts://tracking:5000/1/abc/artifacts"),
            ArtifactLocation::Proxied("1/abc/artifacts".into())
        );
        assert_eq!(
            ArtifactLocation::parse("dbfs:/databricks/mlflow-tracking/4072/abc/artifacts"),
            ArtifactLocation::Dbfs("/databricks/mlflow-tracking/4072/abc/artifacts".into())
        );
        assert_eq!(
            ArtifactLocation::parse("file:///opt/mlruns/1/abc/artifacts"),
            ArtifactLocation::Local(PathBuf::from("/opt/mlruns/1/abc/artifacts"))
        );
        assert_eq!(
            ArtifactLocation::parse("/opt/mlruns/1/abc/artifacts"),
            ArtifactLocation::Local(PathBuf::from("/opt/mlruns/1/abc/artifacts"))
        );
        assert_eq!(
            ArtifactLocation::parse("s3://bucket/1/abc/artifacts"),
            ArtifactLocation::Server
        );
    }

    #[test]
    fn test_run_wire_accepts_string_int64() {
        let json = r#"{
            "info": {
                "run_id": "abc", "experiment_id": "1", "user_id": "alice",
                "status": "FINISHED", "start_time": "1700000000000", "end_time": 1700000001000,
                "artifact_uri": "mlflow-artifacts:/1/abc/artifacts", "lifecycle_stage": "active"
            },
            "data": {
                "metrics": [{"key": "rmse", "value": 0.7, "timestamp": "1700000000500", "step": 3}],
                "params": [{"key": "alpha", "value": "0.5"}],
                "tags": [{"key": "mlflow.runName", "value": "baseline"}]
            }
        }"#;
        let wire: WireRun = serde_json::from_str(json).unwrap();
        let run: Run = wire.into();
        assert_eq!(run.info.start_time, 1_700_000_000_000);
        assert_eq!(run.info.end_time, Some(1_700_000_001_000));
        assert_eq!(run.data.metrics["rmse"].step(), 3);
        assert_eq!(run.data.params["alpha"], "0.5");
        assert_eq!(run.data.tags[RUN_NAME_TAG], "baseline");
    }

    #[test]
    fn test_model_version_wire() {
        let json = r#"{
            "name": "wine", "version": "3", "current_stage": "Production",
            "status": "READY", "run_id": "abc", "source": "models:/wine/3",
            "status_message": ""
        }"#;
        let wire: WireModelVersion = serde_json::from_str(json).unwrap();
        let version: ModelVersion = wire.into();
        assert_eq!(version.version, 3);
        assert_eq!(version.current_stage, Stage::Production);
        assert_eq!(version.status_message, None);
        assert_eq!(version.description, "");
    }

    #[test]
    fn test_notebook_export_requires_databricks() {
        let config = ClientConfig::resolve("http://localhost:5000", None, None).unwrap();
        let client = RestClient::new(config).unwrap();
        let err = client
            .export_notebook("/Users/alice/nb", NotebookFormat::Source)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
