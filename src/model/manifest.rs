//! `model.json`: registered model metadata plus version→run bindings

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity::{ModelVersion, ModelVersionStatus, Stage, TagSet};
use crate::run::ExportInfo;
use crate::{Error, Result};

/// File name of the model manifest.
pub const MODEL_MANIFEST: &str = "model.json";

/// Subdirectory holding one run export per version.
pub const VERSIONS_DIR: &str = "versions";

/// One exported version and where its backing run was exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Source version number
    pub version: u32,
    /// Source stage
    pub stage: Stage,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Source registration status
    pub status: ModelVersionStatus,
    /// Source status message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Source creator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Source run id
    pub run_id: String,
    /// Source artifact path expression
    pub source: String,
    /// Version tags
    #[serde(default)]
    pub tags: TagSet,
    /// Run export directory, relative to the model export directory
    pub run_export_path: String,
}

impl VersionRecord {
    /// Record for `version` whose run went to `run_export_path`.
    #[must_use]
    pub fn new(version: &ModelVersion, run_export_path: impl Into<String>) -> Self {
        Self {
            version: version.version,
            stage: version.current_stage,
            description: version.description.clone(),
            status: version.status,
            status_message: version.status_message.clone(),
            user_id: version.user_id.clone(),
            run_id: version.run_id.clone(),
            source: version.source.clone(),
            tags: version.tags.clone(),
            run_export_path: run_export_path.into(),
        }
    }

    /// Relative run export path of `version`.
    #[must_use]
    pub fn run_export_path_for(version: u32) -> String {
        format!("{VERSIONS_DIR}/{version}")
    }

    /// Check that `run_export_path` stays inside the model export directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty path, an absolute path,
    /// or any segment that is empty, `.`, `..` or a drive prefix.
    pub fn validate_run_export_path(&self) -> Result<()> {
        let escapes = self.run_export_path.split('/').any(|segment| {
            let mut components = Path::new(segment).components();
            !matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            ) || segment.contains('\\')
        });
        if escapes {
            return Err(Error::InvalidInput(format!(
                "version {} run_export_path '{}' must be a relative path inside the export",
                self.version, self.run_export_path
            )));
        }
        Ok(())
    }

    /// Absolute run export directory under `model_dir`.
    #[must_use]
    pub fn run_dir(&self, model_dir: &Path) -> PathBuf {
        self.run_export_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(model_dir.to_path_buf(), |path, segment| path.join(segment))
    }
}

/// Serialized form of an exported registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Export metadata (shared by every version's run export)
    pub export_info: ExportInfo,
    /// Model name at the source
    pub name: String,
    /// Model description
    #[serde(default)]
    pub description: String,
    /// Model tags
    #[serde(default)]
    pub tags: TagSet,
    /// Exported versions, ascending by source version number
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl ModelManifest {
    /// Write `model.json` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns IO or JSON errors.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(MODEL_MANIFEST), json)?;
        Ok(())
    }

    /// Read `model.json` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the manifest is missing or a
    /// version's run export path leaves `dir`, or a JSON error when it does
    /// not parse.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MODEL_MANIFEST);
        if !path.is_file() {
            return Err(Error::InvalidInput(format!(
                "no {MODEL_MANIFEST} in {}",
                dir.display()
            )));
        }
        let manifest: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        for record in &manifest.versions {
            record.validate_run_export_path()?;
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_record_paths() {
        let mut version = ModelVersion::new("wine", 3, "/mlruns/1/abc/artifacts/model", "abc");
        version.current_stage = Stage::Staging;
        let record = VersionRecord::new(&version, VersionRecord::run_export_path_for(3));
        assert_eq!(record.run_export_path, "versions/3");
        assert_eq!(
            record.run_dir(Path::new("/exports/wine")),
            Path::new("/exports/wine/versions/3")
        );
        assert_eq!(record.stage, Stage::Staging);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let version = ModelVersion::new("wine", 1, "s", "r");
        let manifest = ModelManifest {
            export_info: ExportInfo::now(true, Vec::new()),
            name: "wine".into(),
            description: "red and white".into(),
            tags: TagSet::new(),
            versions: vec![VersionRecord::new(&version, "versions/1")],
        };
        manifest.write(dir.path()).unwrap();
        assert_eq!(ModelManifest::read(dir.path()).unwrap(), manifest);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MODEL_MANIFEST)).unwrap())
                .unwrap();
        assert_eq!(json["versions"][0]["stage"], "None");
        assert_eq!(json["versions"][0]["status"], "PENDING_REGISTRATION");
    }

    #[test]
    fn test_read_rejects_escaping_run_export_path() {
        let version = ModelVersion::new("wine", 1, "s", "r");
        let escaping = [
            "../outside",
            "versions/../../outside",
            "/etc/passwd",
            "",
            "versions//1",
            "./versions/1",
        ];
        for bad in escaping {
            let dir = tempfile::tempdir().unwrap();
            let manifest = ModelManifest {
                export_info: ExportInfo::now(true, Vec::new()),
                name: "wine".into(),
                description: String::new(),
                tags: TagSet::new(),
                versions: vec![VersionRecord::new(&version, bad)],
            };
            manifest.write(dir.path()).unwrap();
            let err = ModelManifest::read(dir.path()).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{bad}: {err}");
        }
    }
}
