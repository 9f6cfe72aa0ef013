//! `run.json`: the replayable description of one exported run

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NotebookFormat;
use crate::entity::{Metric, RunInfo, TagSet};
use crate::{Error, Result};

/// File name of the run manifest inside an export directory.
pub const RUN_MANIFEST: &str = "run.json";

/// Subdirectory holding the downloaded artifact tree.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// How and when a run was exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// Export time
    pub exported_at: DateTime<Utc>,
    /// `mlflow-porter` version that wrote the manifest
    pub tool_version: String,
    /// Tracking URI of the source server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tracking_uri: Option<String>,
    /// Whether provenance tags were added to `tags`
    pub export_source_tags: bool,
    /// Notebook formats exported alongside the artifacts
    #[serde(default)]
    pub notebook_formats: Vec<NotebookFormat>,
}

impl ExportInfo {
    /// Export info stamped now with this crate's version.
    #[must_use]
    pub fn now(export_source_tags: bool, notebook_formats: Vec<NotebookFormat>) -> Self {
        Self {
            exported_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            source_tracking_uri: None,
            export_source_tags,
            notebook_formats,
        }
    }
}

/// Serialized form of an exported run.
///
/// `tags` is the tag set the destination run receives: the source tags plus
/// provenance tags when they were requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Export metadata
    pub export_info: ExportInfo,
    /// Source run info
    pub info: RunInfo,
    /// Params
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Latest point per metric
    #[serde(default)]
    pub metrics: Vec<Metric>,
    /// Tags to set on the destination run
    #[serde(default)]
    pub tags: TagSet,
}

impl RunManifest {
    /// Write `run.json` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns IO or JSON errors.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(RUN_MANIFEST), json)?;
        Ok(())
    }

    /// Read `run.json` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the manifest is missing, or a
    /// JSON error when it does not parse.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(RUN_MANIFEST);
        if !path.is_file() {
            return Err(Error::InvalidInput(format!(
                "no {RUN_MANIFEST} in {}",
                dir.display()
            )));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RunStatus;

    fn sample() -> RunManifest {
        let mut info = RunInfo::new("abc", "1", "/tmp/mlruns/1/abc/artifacts");
        info.status = RunStatus::Finished;
        let mut tags = TagSet::new();
        tags.insert("team".into(), "ml".into());
        RunManifest {
            export_info: ExportInfo::now(false, vec![NotebookFormat::Source]),
            info,
            params: BTreeMap::from([("alpha".to_string(), "0.5".to_string())]),
            metrics: vec![Metric::builder("rmse", 0.7).step(3).timestamp(42).build()],
            tags,
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample();
        manifest.write(dir.path()).unwrap();
        assert_eq!(RunManifest::read(dir.path()).unwrap(), manifest);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["info"]["status"], "FINISHED");
        assert_eq!(json["export_info"]["notebook_formats"][0], "SOURCE");
        assert_eq!(json["metrics"][0]["step"], 3);
        assert!(json["export_info"].get("source_tracking_uri").is_none());
    }

    #[test]
    fn test_missing_manifest_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RunManifest::read(dir.path()).unwrap_err().is_configuration());
    }
}
