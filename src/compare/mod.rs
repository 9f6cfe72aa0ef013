//! Comparison harness
//!
//! Jidoka: verify that an imported run or model is equivalent to its
//! source, stopping at the first difference with [`Error::Mismatch`].
//!
//! | Field | Rule |
//! |---|---|
//! | `run_id` | must differ |
//! | `lifecycle_stage`, `status` | must match |
//! | params, metric values | must match |
//! | run tags outside the `mlflow` namespace | must match |
//! | registered model tags | must match exactly |
//! | artifact files | byte-for-byte |
//! | `user_id` | per [`ComparisonPolicy`] |
//!
//! Run tags under `mlflow*` are excluded: system tags (`mlflow.user`,
//! `mlflow.source.*`) are rewritten by the destination server and
//! provenance keys live under `mlflow_export_import.`. Registered model
//! tags are copied verbatim, so every key is compared.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::client::TrackingClient;
use crate::entity::{ModelVersion, Run, TagSet};
use crate::model::extract_model_path;
use crate::provenance::ProvenanceRecord;
use crate::{Error, Result};

/// When to compare `user_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserIdComparison {
    /// Always compare
    Always,
    /// Never compare
    Never,
    /// Compare unless the destination is a Databricks workspace, which
    /// records the importing user
    #[default]
    UnlessDatabricksDestination,
}

/// Comparison settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonPolicy {
    user_id: UserIdComparison,
}

impl ComparisonPolicy {
    /// Default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `user_id` rule.
    #[must_use]
    pub const fn with_user_id(mut self, rule: UserIdComparison) -> Self {
        self.user_id = rule;
        self
    }

    /// Whether `user_id` is compared for this destination.
    #[must_use]
    pub fn compares_user_id(&self, destination: &dyn TrackingClient) -> bool {
        match self.user_id {
            UserIdComparison::Always => true,
            UserIdComparison::Never => false,
            UserIdComparison::UnlessDatabricksDestination => !destination.is_databricks(),
        }
    }
}

fn ensure_eq<T: PartialEq + std::fmt::Debug>(field: &str, source: &T, destination: &T) -> Result<()> {
    if source == destination {
        Ok(())
    } else {
        Err(Error::mismatch(field, source, destination))
    }
}

fn comparable_tags(tags: &TagSet) -> TagSet {
    tags.iter()
        .filter(|(key, _)| !key.starts_with("mlflow"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Compare two run records (no artifacts).
///
/// # Errors
///
/// Returns [`Error::Mismatch`] for the first differing field.
pub fn compare_run_records(source: &Run, destination: &Run, compare_user_id: bool) -> Result<()> {
    if source.run_id() == destination.run_id() {
        return Err(Error::mismatch(
            "run_id (expected to differ)",
            source.run_id(),
            destination.run_id(),
        ));
    }
    ensure_eq(
        "lifecycle_stage",
        &source.info.lifecycle_stage,
        &destination.info.lifecycle_stage,
    )?;
    ensure_eq("status", &source.info.status, &destination.info.status)?;
    if compare_user_id {
        ensure_eq("user_id", &source.info.user_id, &destination.info.user_id)?;
    }
    ensure_eq("params", &source.data.params, &destination.data.params)?;
    ensure_eq(
        "metrics",
        &source.data.metric_values(),
        &destination.data.metric_values(),
    )?;
    ensure_eq(
        "tags",
        &comparable_tags(&source.data.tags),
        &comparable_tags(&destination.data.tags),
    )
}

/// Compare a source run with its imported copy, artifacts included.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] for the first difference, or any client or
/// IO error hit while fetching either side.
pub fn compare_runs(
    source: &dyn TrackingClient,
    destination: &dyn TrackingClient,
    source_run_id: &str,
    destination_run_id: &str,
    policy: &ComparisonPolicy,
) -> Result<()> {
    let src = source.get_run(source_run_id)?;
    let dst = destination.get_run(destination_run_id)?;
    compare_run_records(&src, &dst, policy.compares_user_id(destination))?;
    compare_run_artifacts(source, destination, source_run_id, destination_run_id)
}

/// [`compare_runs`] plus a check that the destination carries provenance
/// naming the source run.
///
/// # Errors
///
/// As [`compare_runs`]; additionally [`Error::Mismatch`] when provenance is
/// absent or disagrees with the source run.
pub fn compare_runs_with_source_tags(
    source: &dyn TrackingClient,
    destination: &dyn TrackingClient,
    source_run_id: &str,
    destination_run_id: &str,
    policy: &ComparisonPolicy,
) -> Result<()> {
    compare_runs(source, destination, source_run_id, destination_run_id, policy)?;

    let src = source.get_run(source_run_id)?;
    let dst = destination.get_run(destination_run_id)?;
    let record = ProvenanceRecord::from_tags(&dst.data.tags)
        .ok_or_else(|| Error::mismatch("provenance tags", "present", "absent"))?;

    let experiment = source.get_experiment(src.experiment_id())?;
    ensure_eq(
        "provenance experiment_name",
        &experiment.name(),
        &record.experiment_name.as_str(),
    )?;
    ensure_eq(
        "provenance experiment_id",
        &src.experiment_id(),
        &record.experiment_id.as_str(),
    )?;
    // tag values are strings, so compare the string form of every field
    for (field, value) in src.info.string_fields() {
        ensure_eq(
            &format!("provenance run_info.{field}"),
            &Some(value.as_str()),
            &record.run_info.get(field).map(String::as_str),
        )?;
    }
    Ok(())
}

/// Download both runs' artifacts and diff them.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] on the first differing file, or any client or
/// IO error.
pub fn compare_run_artifacts(
    source: &dyn TrackingClient,
    destination: &dyn TrackingClient,
    source_run_id: &str,
    destination_run_id: &str,
) -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let src_dir = scratch.path().join("source");
    let dst_dir = scratch.path().join("destination");
    source.download_artifacts(source_run_id, "", &src_dir)?;
    destination.download_artifacts(destination_run_id, "", &dst_dir)?;
    compare_dirs(&src_dir, &dst_dir)
}

/// Compare two model versions and their backing runs.
///
/// Must match: stage, description, status, status message, model path
/// inside the run's artifacts; `user_id` per `policy`. Must differ: run id.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] for the first difference.
pub fn compare_versions(
    source: &dyn TrackingClient,
    destination: &dyn TrackingClient,
    source_version: &ModelVersion,
    destination_version: &ModelVersion,
    policy: &ComparisonPolicy,
) -> Result<()> {
    let field = |name: &str| format!("version {}: {name}", source_version.version);
    ensure_eq(
        &field("current_stage"),
        &source_version.current_stage,
        &destination_version.current_stage,
    )?;
    ensure_eq(
        &field("description"),
        &source_version.description,
        &destination_version.description,
    )?;
    ensure_eq(&field("status"), &source_version.status, &destination_version.status)?;
    ensure_eq(
        &field("status_message"),
        &source_version.status_message,
        &destination_version.status_message,
    )?;
    if policy.compares_user_id(destination) {
        ensure_eq(&field("user_id"), &source_version.user_id, &destination_version.user_id)?;
    }
    if source_version.run_id == destination_version.run_id {
        return Err(Error::mismatch(
            field("run_id (expected to differ)"),
            &source_version.run_id,
            &destination_version.run_id,
        ));
    }
    ensure_eq(
        &field("model path"),
        &extract_model_path(&source_version.source, &source_version.run_id)?,
        &extract_model_path(&destination_version.source, &destination_version.run_id)?,
    )?;
    compare_runs(
        source,
        destination,
        &source_version.run_id,
        &destination_version.run_id,
        policy,
    )
}

/// Compare two registered models and the given `(source, destination)`
/// version pairs, in order.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] for the first difference, or any client
/// error.
pub fn compare_models(
    source: &dyn TrackingClient,
    destination: &dyn TrackingClient,
    source_model: &str,
    destination_model: &str,
    version_pairs: &[(u32, u32)],
    policy: &ComparisonPolicy,
) -> Result<()> {
    let src = source.get_registered_model(source_model)?;
    let dst = destination.get_registered_model(destination_model)?;
    ensure_eq("model description", &src.description, &dst.description)?;
    ensure_eq("model tags", &src.tags, &dst.tags)?;
    for &(src_version, dst_version) in version_pairs {
        let src_v = source.get_model_version(source_model, src_version)?;
        let dst_v = destination.get_model_version(destination_model, dst_version)?;
        compare_versions(source, destination, &src_v, &dst_v, policy)?;
    }
    Ok(())
}

fn relative_files(root: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Other(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative, entry.path().to_path_buf());
    }
    Ok(files)
}

/// Recursively compare two directory trees: same relative file set, same
/// bytes.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] naming the file set or first differing file.
pub fn compare_dirs(source: &Path, destination: &Path) -> Result<()> {
    let src = relative_files(source)?;
    let dst = relative_files(destination)?;
    ensure_eq(
        "artifact files",
        &src.keys().collect::<Vec<_>>(),
        &dst.keys().collect::<Vec<_>>(),
    )?;
    for (relative, src_path) in &src {
        let src_bytes = fs::read(src_path)?;
        let dst_bytes = fs::read(&dst[relative])?;
        if src_bytes != dst_bytes {
            return Err(Error::mismatch(
                format!("artifact {relative}"),
                format!("{} bytes", src_bytes.len()),
                format!("{} bytes", dst_bytes.len()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryTrackingServer;
    use crate::entity::{Metric, RunInfo};

    fn run(run_id: &str) -> Run {
        let mut run = Run {
            info: RunInfo::new(run_id, "1", format!("/mlruns/1/{run_id}/artifacts")),
            data: Default::default(),
        };
        run.info.user_id = "alice".into();
        run.data.params.insert("alpha".into(), "0.5".into());
        run.data.metrics.insert("rmse".into(), Metric::new("rmse", 0.7));
        run.data.tags.insert("team".into(), "ml".into());
        run
    }

    #[test]
    fn test_run_ids_must_differ() {
        let err = compare_run_records(&run("a"), &run("a"), true).unwrap_err();
        assert!(matches!(err, Error::Mismatch { ref field, .. } if field.starts_with("run_id")));
        compare_run_records(&run("a"), &run("b"), true).unwrap();
    }

    #[test]
    fn test_mlflow_tags_ignored() {
        let src = run("a");
        let mut dst = run("b");
        dst.data.tags.insert("mlflow.user".into(), "bob".into());
        dst.data
            .tags
            .insert("mlflow_export_import.metadata.experiment_id".into(), "1".into());
        compare_run_records(&src, &dst, true).unwrap();

        dst.data.tags.insert("team".into(), "infra".into());
        let err = compare_run_records(&src, &dst, true).unwrap_err();
        assert!(matches!(err, Error::Mismatch { ref field, .. } if field == "tags"));
    }

    #[test]
    fn test_metric_and_param_differences() {
        let src = run("a");
        let mut dst = run("b");
        dst.data.metrics.insert("rmse".into(), Metric::new("rmse", 0.8));
        assert!(compare_run_records(&src, &dst, true).is_err());

        let mut dst = run("b");
        dst.data.params.insert("beta".into(), "1".into());
        assert!(compare_run_records(&src, &dst, true).is_err());
    }

    #[test]
    fn test_user_id_policy() {
        let src = run("a");
        let mut dst = run("b");
        dst.info.user_id = "importer".into();
        assert!(compare_run_records(&src, &dst, true).is_err());
        compare_run_records(&src, &dst, false).unwrap();

        let oss = InMemoryTrackingServer::new();
        let dbx = InMemoryTrackingServer::databricks();
        let policy = ComparisonPolicy::default();
        assert!(policy.compares_user_id(&oss));
        assert!(!policy.compares_user_id(&dbx));
        assert!(ComparisonPolicy::new()
            .with_user_id(UserIdComparison::Always)
            .compares_user_id(&dbx));
        assert!(!ComparisonPolicy::new()
            .with_user_id(UserIdComparison::Never)
            .compares_user_id(&oss));
    }

    #[test]
    fn test_compare_dirs() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [a.path(), b.path()] {
            fs::create_dir_all(dir.join("model")).unwrap();
            fs::write(dir.join("model/model.pkl"), b"pkl").unwrap();
        }
        compare_dirs(a.path(), b.path()).unwrap();

        fs::write(b.path().join("model/model.pkl"), b"PKL").unwrap();
        let err = compare_dirs(a.path(), b.path()).unwrap_err();
        assert!(matches!(err, Error::Mismatch { ref field, .. } if field == "artifact model/model.pkl"));

        fs::write(b.path().join("extra.txt"), b"x").unwrap();
        let err = compare_dirs(a.path(), b.path()).unwrap_err();
        assert!(matches!(err, Error::Mismatch { ref field, .. } if field == "artifact files"));
    }

    #[test]
    fn test_model_tags_compared_exactly() {
        let src = InMemoryTrackingServer::new();
        let dst = InMemoryTrackingServer::new();
        let mut tags = TagSet::new();
        tags.insert("domain".into(), "wine".into());
        tags.insert("mlflow.owner".into(), "alice".into());
        src.create_registered_model("wine", "d", &tags).unwrap();
        dst.create_registered_model("wine", "d", &tags).unwrap();
        let policy = ComparisonPolicy::default();
        compare_models(&src, &dst, "wine", "wine", &[], &policy).unwrap();

        tags.insert("mlflow.owner".into(), "bob".into());
        dst.create_registered_model("wine_bob", "d", &tags).unwrap();
        let err = compare_models(&src, &dst, "wine", "wine_bob", &[], &policy).unwrap_err();
        assert!(matches!(err, Error::Mismatch { ref field, .. } if field == "model tags"));
    }
}
