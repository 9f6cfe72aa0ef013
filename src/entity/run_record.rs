//! Run - one execution record on a tracking server

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Metric, TagSet};
use crate::{Error, Result};

/// Tag MLflow uses to carry the display name of a run.
pub const RUN_NAME_TAG: &str = "mlflow.runName";

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is currently executing.
    Running,
    /// Run is queued but not yet started.
    Scheduled,
    /// Run completed successfully.
    Finished,
    /// Run failed with an error.
    Failed,
    /// Run was killed by user or system.
    Killed,
}

impl RunStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }

    /// Whether the run has reached a terminal status.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Killed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "SCHEDULED" => Ok(Self::Scheduled),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            other => Err(Error::InvalidInput(format!("unknown run status '{other}'"))),
        }
    }
}

/// Lifecycle stage of a run or experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    /// Visible in the tracking UI.
    #[default]
    Active,
    /// Soft-deleted.
    Deleted,
}

impl LifecycleStage {
    /// Wire name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identifying fields of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunInfo {
    /// Server-assigned run id.
    pub run_id: String,
    /// Owning experiment.
    pub experiment_id: String,
    /// Display name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    /// User that created the run.
    #[serde(default)]
    pub user_id: String,
    /// Current status.
    pub status: RunStatus,
    /// Start time in milliseconds since the Unix epoch.
    pub start_time: i64,
    /// End time in milliseconds, once terminated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// Root URI of the run's artifacts.
    pub artifact_uri: String,
    /// Lifecycle stage.
    #[serde(default)]
    pub lifecycle_stage: LifecycleStage,
}

impl RunInfo {
    /// Info for a freshly created, running run.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        artifact_uri: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: None,
            user_id: String::new(),
            status: RunStatus::Running,
            start_time: 0,
            end_time: None,
            artifact_uri: artifact_uri.into(),
            lifecycle_stage: LifecycleStage::Active,
        }
    }

    /// Every info field as `(name, string value)`, skipping absent optionals.
    ///
    /// Numeric and enum fields are rendered in their wire form; this is the
    /// coercion provenance tags rely on.
    #[must_use]
    pub fn string_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("run_id", self.run_id.clone()),
            ("experiment_id", self.experiment_id.clone()),
            ("user_id", self.user_id.clone()),
            ("status", self.status.to_string()),
            ("start_time", self.start_time.to_string()),
            ("artifact_uri", self.artifact_uri.clone()),
            ("lifecycle_stage", self.lifecycle_stage.to_string()),
        ];
        if let Some(end_time) = self.end_time {
            fields.push(("end_time", end_time.to_string()));
        }
        if let Some(run_name) = &self.run_name {
            fields.push(("run_name", run_name.clone()));
        }
        fields
    }
}

/// Params, latest metrics and tags of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunData {
    /// Params (immutable per run).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Latest metric point per key.
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
    /// Tags.
    #[serde(default)]
    pub tags: TagSet,
}

impl RunData {
    /// Metric values keyed by name, for equality checks.
    #[must_use]
    pub fn metric_values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(key, metric)| (key.clone(), metric.value()))
            .collect()
    }
}

/// A run: info plus data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    /// Identifying fields.
    pub info: RunInfo,
    /// Params, metrics and tags.
    #[serde(default)]
    pub data: RunData,
}

impl Run {
    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.info.experiment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_wire_names() {
        assert_eq!(serde_json::to_string(&RunStatus::Finished).unwrap(), "\"FINISHED\"");
        assert_eq!("killed".parse::<RunStatus>().unwrap(), RunStatus::Killed);
        assert!("DONE".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_run_status_terminated() {
        assert!(!RunStatus::Running.is_terminated());
        assert!(!RunStatus::Scheduled.is_terminated());
        assert!(RunStatus::Finished.is_terminated());
        assert!(RunStatus::Failed.is_terminated());
    }

    #[test]
    fn test_string_fields_skip_absent_optionals() {
        let mut info = RunInfo::new("abc", "1", "/tmp/mlruns/1/abc/artifacts");
        info.start_time = 1_700_000_000_000;
        let fields = info.string_fields();
        assert!(fields.iter().any(|(k, v)| *k == "start_time" && v == "1700000000000"));
        assert!(fields.iter().any(|(k, v)| *k == "status" && v == "RUNNING"));
        assert!(!fields.iter().any(|(k, _)| *k == "end_time" || *k == "run_name"));

        info.end_time = Some(1_700_000_000_500);
        info.run_name = Some("baseline".into());
        let fields = info.string_fields();
        assert!(fields.iter().any(|(k, v)| *k == "end_time" && v == "1700000000500"));
        assert!(fields.iter().any(|(k, v)| *k == "run_name" && v == "baseline"));
    }

    #[test]
    fn test_metric_values() {
        let mut data = RunData::default();
        data.metrics.insert("rmse".into(), Metric::new("rmse", 0.7));
        assert_eq!(data.metric_values().get("rmse"), Some(&0.7));
    }
}
