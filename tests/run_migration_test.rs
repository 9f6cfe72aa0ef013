//! Run export/import tests against in-memory tracking servers
//!
//! Covers the run-level guarantees:
//! 1. Round-trip identity of params, metrics, tags and artifact bytes
//! 2. Fresh run ids at the destination
//! 3. Provenance tags and their survival across hops
//! 4. Failure modes (download failure, param conflict, reserved tags)
//!
//! Toyota Way: Jidoka (Built-in Quality)

use std::path::{Path, PathBuf};

use mlflow_porter::client::{ExperimentTarget, InMemoryTrackingServer, TrackingClient};
use mlflow_porter::compare::{
    compare_runs, compare_runs_with_source_tags, ComparisonPolicy, UserIdComparison,
};
use mlflow_porter::entity::{
    Experiment, FileInfo, Metric, ModelVersion, NewModelVersion, RegisteredModel, Run, RunStatus,
    Stage, TagSet, RUN_NAME_TAG,
};
use mlflow_porter::provenance::ProvenanceRecord;
use mlflow_porter::run::{RunExportOptions, RunExporter, RunImporter, RUN_MANIFEST};
use mlflow_porter::{Error, Result};

// ============================================================================
// Fixtures
// ============================================================================

/// Finished run with params, metrics, tags and a nested artifact tree.
fn seed_run(server: &InMemoryTrackingServer) -> String {
    let experiment_id = server.create_experiment("sklearn_wine").unwrap();
    let mut tags = TagSet::new();
    tags.insert(RUN_NAME_TAG.into(), "baseline".into());
    tags.insert("team".into(), "ml-platform".into());
    let run = server.create_run(&experiment_id, 1_700_000_000_000, &tags).unwrap();
    let run_id = run.info.run_id;

    server.log_param(&run_id, "alpha", "0.5").unwrap();
    server.log_param(&run_id, "l1_ratio", "0.1").unwrap();
    server
        .log_metric(
            &run_id,
            &Metric::builder("rmse", 0.72).timestamp(1_700_000_000_500).step(9).build(),
        )
        .unwrap();
    server
        .log_metric(&run_id, &Metric::builder("r2", 0.31).timestamp(1_700_000_000_600).build())
        .unwrap();
    server.put_artifact(&run_id, "plot.png", &[0x89, 0x50, 0x4e, 0x47]).unwrap();
    server.put_artifact(&run_id, "model/MLmodel", b"flavors: sklearn").unwrap();
    server.put_artifact(&run_id, "model/model.pkl", &[0u8; 2048]).unwrap();
    server
        .set_terminated(&run_id, RunStatus::Finished, Some(1_700_000_060_000))
        .unwrap();
    run_id
}

fn export(server: &InMemoryTrackingServer, run_id: &str, dir: &Path, source_tags: bool) {
    RunExporter::new(server)
        .with_options(RunExportOptions::new().with_source_tags(source_tags))
        .export_run(run_id, dir)
        .unwrap();
}

fn import(server: &dyn TrackingClient, dir: &Path, experiment: &str) -> Run {
    RunImporter::new(server)
        .import_run(dir, &ExperimentTarget::name(experiment))
        .unwrap()
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_round_trip_preserves_run_content() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = InMemoryTrackingServer::new();
    let imported = import(&dest, dir.path(), "imported");
    let original = source.get_run(&run_id).unwrap();

    assert_ne!(imported.run_id(), run_id);
    assert_eq!(imported.data.params, original.data.params);
    assert_eq!(imported.data.metric_values(), original.data.metric_values());
    assert_eq!(imported.data.metrics["rmse"].step(), 9);
    assert_eq!(imported.data.tags["team"], "ml-platform");
    assert_eq!(imported.info.run_name.as_deref(), Some("baseline"));
    assert_eq!(imported.info.end_time, Some(1_700_000_060_000));

    compare_runs(&source, &dest, &run_id, imported.run_id(), &ComparisonPolicy::default())
        .unwrap();
}

#[test]
fn test_artifact_bytes_identical() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = InMemoryTrackingServer::databricks();
    let imported = import(&dest, dir.path(), "/Users/alice/imported");

    for path in ["plot.png", "model/MLmodel", "model/model.pkl"] {
        assert_eq!(
            dest.artifact(imported.run_id(), path),
            source.artifact(&run_id, path),
            "{path}"
        );
    }
    assert!(imported
        .info
        .artifact_uri
        .starts_with("dbfs:/databricks/mlflow-tracking/"));
}

#[test]
fn test_manifest_written_with_tree() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(RUN_MANIFEST)).unwrap())
            .unwrap();
    assert_eq!(json["info"]["run_id"], run_id.as_str());
    assert_eq!(json["params"]["alpha"], "0.5");
    assert_eq!(json["export_info"]["source_tracking_uri"], "memory://mlflow");
    assert!(dir.path().join("artifacts/model/model.pkl").is_file());
}

#[test]
fn test_import_into_experiment_id() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = InMemoryTrackingServer::new();
    let run = RunImporter::new(&dest)
        .import_run(dir.path(), &ExperimentTarget::id("0"))
        .unwrap();
    assert_eq!(run.experiment_id(), "0");

    let err = RunImporter::new(&dest)
        .import_run(dir.path(), &ExperimentTarget::id("42"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "experiment", .. }));
}

// ============================================================================
// Provenance
// ============================================================================

#[test]
fn test_source_tags_round_trip() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), true);

    let dest = InMemoryTrackingServer::new();
    let imported = import(&dest, dir.path(), "imported");

    compare_runs_with_source_tags(
        &source,
        &dest,
        &run_id,
        imported.run_id(),
        &ComparisonPolicy::default(),
    )
    .unwrap();

    let record = ProvenanceRecord::from_tags(&imported.data.tags).unwrap();
    assert_eq!(record.run_info["status"], "FINISHED");
    assert_eq!(record.run_info["start_time"], "1700000000000");
    assert_eq!(record.tracking_uri.as_deref(), Some("memory://mlflow"));
}

#[test]
fn test_without_source_tags_no_back_reference() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = InMemoryTrackingServer::new();
    let imported = import(&dest, dir.path(), "imported");
    assert!(ProvenanceRecord::from_tags(&imported.data.tags).is_none());

    let err = compare_runs_with_source_tags(
        &source,
        &dest,
        &run_id,
        imported.run_id(),
        &ComparisonPolicy::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Mismatch { .. }));
}

#[test]
fn test_provenance_survives_second_hop() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let first = tempfile::tempdir().unwrap();
    export(&source, &run_id, first.path(), true);

    let middle = InMemoryTrackingServer::new();
    let hop = import(&middle, first.path(), "hop");

    // second hop without source tags replays the first hop's provenance
    let second = tempfile::tempdir().unwrap();
    export(&middle, hop.run_id(), second.path(), false);
    let dest = InMemoryTrackingServer::new();
    let last = import(&dest, second.path(), "final");

    let record = ProvenanceRecord::from_tags(&last.data.tags).unwrap();
    assert_eq!(record.run_info["run_id"], run_id);
    assert_eq!(record.experiment_name, "sklearn_wine");

    // with source tags the second hop becomes the recorded origin
    export(&middle, hop.run_id(), second.path(), true);
    let relinked = import(&dest, second.path(), "final");
    let record = ProvenanceRecord::from_tags(&relinked.data.tags).unwrap();
    assert_eq!(record.run_info["run_id"], hop.run_id());
    assert_eq!(record.experiment_name, "hop");
}

// ============================================================================
// User id policy
// ============================================================================

#[test]
fn test_user_id_skipped_for_databricks_destination() {
    let source = InMemoryTrackingServer::new().with_user("alice");
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = InMemoryTrackingServer::databricks().with_user("importer@example.com");
    let imported = import(&dest, dir.path(), "/Shared/imported");

    compare_runs(&source, &dest, &run_id, imported.run_id(), &ComparisonPolicy::default())
        .unwrap();
    let strict = ComparisonPolicy::new().with_user_id(UserIdComparison::Always);
    let err = compare_runs(&source, &dest, &run_id, imported.run_id(), &strict).unwrap_err();
    assert!(matches!(err, Error::Mismatch { ref field, .. } if field == "user_id"));
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_download_failure_leaves_no_manifest() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    source.fail_downloads_for(&run_id);
    let dir = tempfile::tempdir().unwrap();

    let err = RunExporter::new(&source).export_run(&run_id, dir.path()).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(!dir.path().join(RUN_MANIFEST).exists());
}

#[test]
fn test_unknown_run_is_not_found() {
    let source = InMemoryTrackingServer::new();
    let dir = tempfile::tempdir().unwrap();
    let err = RunExporter::new(&source).export_run("missing", dir.path()).unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "run", .. }));
}

#[test]
fn test_reserved_tag_on_source_run_rejected_at_export() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    source
        .set_tag(&run_id, "mlflow_export_import.metadata.owner", "bob")
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = RunExporter::new(&source).export_run(&run_id, dir.path()).unwrap_err();
    assert!(matches!(err, Error::ReservedTag(_)));
    assert!(!dir.path().join(RUN_MANIFEST).exists());
}

#[test]
fn test_reserved_tag_rejected_with_source_tags_enabled() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    source
        .set_tag(&run_id, "mlflow_export_import.metadata.owner", "bob")
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = RunExporter::new(&source)
        .with_options(RunExportOptions::new().with_source_tags(true))
        .export_run(&run_id, dir.path())
        .unwrap_err();
    assert!(matches!(err, Error::ReservedTag(key) if key == "mlflow_export_import.metadata.owner"));
    assert!(!dir.path().join(RUN_MANIFEST).exists());
}

/// Destination that pre-populates every new run with a param, as a server
/// hook would.
struct PresetParamServer {
    inner: InMemoryTrackingServer,
    key: &'static str,
    value: &'static str,
}

impl TrackingClient for PresetParamServer {
    fn tracking_uri(&self) -> &str {
        self.inner.tracking_uri()
    }
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.inner.get_experiment(experiment_id)
    }
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        self.inner.get_experiment_by_name(name)
    }
    fn create_experiment(&self, name: &str) -> Result<String> {
        self.inner.create_experiment(name)
    }
    fn get_run(&self, run_id: &str) -> Result<Run> {
        self.inner.get_run(run_id)
    }
    fn create_run(&self, experiment_id: &str, start_time: i64, tags: &TagSet) -> Result<Run> {
        let run = self.inner.create_run(experiment_id, start_time, tags)?;
        self.inner.log_param(run.run_id(), self.key, self.value)?;
        Ok(run)
    }
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.inner.log_param(run_id, key, value)
    }
    fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        self.inner.log_metric(run_id, metric)
    }
    fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.inner.set_tag(run_id, key, value)
    }
    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: Option<i64>) -> Result<()> {
        self.inner.set_terminated(run_id, status, end_time)
    }
    fn list_artifacts(&self, run_id: &str, path: Option<&str>) -> Result<Vec<FileInfo>> {
        self.inner.list_artifacts(run_id, path)
    }
    fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf> {
        self.inner.download_artifacts(run_id, path, dst)
    }
    fn log_artifacts(&self, run_id: &str, local_dir: &Path, path: Option<&str>) -> Result<()> {
        self.inner.log_artifacts(run_id, local_dir, path)
    }
    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        self.inner.get_registered_model(name)
    }
    fn create_registered_model(
        &self,
        name: &str,
        description: &str,
        tags: &TagSet,
    ) -> Result<RegisteredModel> {
        self.inner.create_registered_model(name, description, tags)
    }
    fn delete_registered_model(&self, name: &str) -> Result<()> {
        self.inner.delete_registered_model(name)
    }
    fn get_latest_versions(&self, name: &str, stages: &[Stage]) -> Result<Vec<ModelVersion>> {
        self.inner.get_latest_versions(name, stages)
    }
    fn create_model_version(&self, name: &str, request: &NewModelVersion) -> Result<ModelVersion> {
        self.inner.create_model_version(name, request)
    }
    fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        self.inner.get_model_version(name, version)
    }
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion> {
        self.inner
            .transition_model_version_stage(name, version, stage, archive_existing_versions)
    }
}

#[test]
fn test_conflicting_param_propagates() {
    let source = InMemoryTrackingServer::new();
    let run_id = seed_run(&source);
    let dir = tempfile::tempdir().unwrap();
    export(&source, &run_id, dir.path(), false);

    let dest = PresetParamServer {
        inner: InMemoryTrackingServer::new(),
        key: "alpha",
        value: "0.9",
    };
    let err = RunImporter::new(&dest)
        .import_run(dir.path(), &ExperimentTarget::name("imported"))
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        Error::ParamConflict { ref key, ref existing, ref attempted, .. }
            if key == "alpha" && existing == "0.9" && attempted == "0.5"
    ));

    // same value is not a conflict
    let agreeing = PresetParamServer {
        inner: InMemoryTrackingServer::new(),
        key: "alpha",
        value: "0.5",
    };
    import(&agreeing, dir.path(), "imported");
}
