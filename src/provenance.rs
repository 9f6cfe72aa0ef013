//! Provenance tags
//!
//! A run's origin (experiment, original `RunInfo`) is recorded as ordinary
//! tags under a reserved namespace so it survives transport to any tracking
//! server:
//!
//! ```text
//! mlflow_export_import.metadata.experiment_id    = "3"
//! mlflow_export_import.metadata.experiment_name  = "sklearn_wine"
//! mlflow_export_import.metadata.tracking_uri     = "http://localhost:5000"
//! mlflow_export_import.metadata.timestamp        = "1700000000000"
//! mlflow_export_import.run_info.run_id           = "48cf29167ddb4e09..."
//! mlflow_export_import.run_info.status           = "FINISHED"
//! ...
//! ```
//!
//! Tag values are strings, so numeric and enum fields are stored in their
//! wire form and must be compared as strings. [`ProvenanceRecord::from_tags`]
//! is the typed decode.
//!
//! Poka-Yoke: [`validate_tags`] rejects keys inside the reserved namespace
//! that this module did not produce, so user tags cannot shadow lineage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{RunInfo, TagSet};
use crate::{Error, Result};

/// Root of the reserved namespace.
pub const TAG_PREFIX: &str = "mlflow_export_import";

/// Prefix for export/import metadata (experiment, source server, time).
pub const METADATA_PREFIX: &str = "mlflow_export_import.metadata";

/// Prefix for mirrored `RunInfo` fields.
pub const RUN_INFO_PREFIX: &str = "mlflow_export_import.run_info";

const METADATA_KEYS: [&str; 4] = ["experiment_id", "experiment_name", "tracking_uri", "timestamp"];

const RUN_INFO_KEYS: [&str; 9] = [
    "run_id",
    "experiment_id",
    "run_name",
    "user_id",
    "status",
    "start_time",
    "end_time",
    "artifact_uri",
    "lifecycle_stage",
];

fn metadata_key(field: &str) -> String {
    format!("{METADATA_PREFIX}.{field}")
}

fn run_info_key(field: &str) -> String {
    format!("{RUN_INFO_PREFIX}.{field}")
}

/// Whether `key` lies inside the reserved namespace.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key == TAG_PREFIX
        || key
            .strip_prefix(TAG_PREFIX)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Whether `key` is one of the provenance keys this module writes.
#[must_use]
pub fn is_provenance_key(key: &str) -> bool {
    if let Some(field) = key
        .strip_prefix(METADATA_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        return METADATA_KEYS.contains(&field);
    }
    key.strip_prefix(RUN_INFO_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|field| RUN_INFO_KEYS.contains(&field))
}

/// Reject reserved-namespace keys that are not provenance keys.
///
/// # Errors
///
/// Returns [`Error::ReservedTag`] naming the first offending key.
pub fn validate_tags(tags: &TagSet) -> Result<()> {
    match tags
        .keys()
        .find(|key| is_reserved(key) && !is_provenance_key(key))
    {
        Some(key) => Err(Error::ReservedTag(key.clone())),
        None => Ok(()),
    }
}

/// Copy of `tags` without the reserved namespace.
#[must_use]
pub fn strip(tags: &TagSet) -> TagSet {
    tags.iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Decoded provenance of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Source experiment id
    pub experiment_id: String,
    /// Source experiment name
    pub experiment_name: String,
    /// Source tracking server, when known at export time
    pub tracking_uri: Option<String>,
    /// Export time in milliseconds since the Unix epoch
    pub timestamp: Option<i64>,
    /// Source `RunInfo` fields in string form
    pub run_info: BTreeMap<String, String>,
}

impl ProvenanceRecord {
    /// Capture the provenance of `info`, stamped with the current time.
    #[must_use]
    pub fn capture(info: &RunInfo, experiment_name: impl Into<String>) -> Self {
        Self::capture_at(info, experiment_name, Utc::now())
    }

    /// Capture the provenance of `info` with an explicit export time.
    #[must_use]
    pub fn capture_at(
        info: &RunInfo,
        experiment_name: impl Into<String>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            experiment_id: info.experiment_id.clone(),
            experiment_name: experiment_name.into(),
            tracking_uri: None,
            timestamp: Some(exported_at.timestamp_millis()),
            run_info: info
                .string_fields()
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect(),
        }
    }

    /// Record the source tracking server.
    #[must_use]
    pub fn with_tracking_uri(mut self, tracking_uri: impl Into<String>) -> Self {
        self.tracking_uri = Some(tracking_uri.into());
        self
    }

    /// Encode as reserved-namespace tags.
    #[must_use]
    pub fn to_tags(&self) -> TagSet {
        let mut tags = TagSet::new();
        tags.insert(metadata_key("experiment_id"), self.experiment_id.clone());
        tags.insert(metadata_key("experiment_name"), self.experiment_name.clone());
        if let Some(uri) = &self.tracking_uri {
            tags.insert(metadata_key("tracking_uri"), uri.clone());
        }
        if let Some(ts) = self.timestamp {
            tags.insert(metadata_key("timestamp"), ts.to_string());
        }
        for (field, value) in &self.run_info {
            tags.insert(run_info_key(field), value.clone());
        }
        tags
    }

    /// Replace any provenance already in `tags` with this record.
    ///
    /// Earlier-hop provenance is dropped so the tags describe the most
    /// recent source. Other keys, including foreign keys inside the
    /// reserved namespace, are left for [`validate_tags`] to reject.
    pub fn apply_to(&self, tags: &mut TagSet) {
        tags.retain(|key, _| !is_provenance_key(key));
        tags.extend(self.to_tags());
    }

    /// Decode provenance from a tag set.
    ///
    /// Returns `None` when the experiment id or name tag is absent.
    #[must_use]
    pub fn from_tags(tags: &TagSet) -> Option<Self> {
        let experiment_id = tags.get(&metadata_key("experiment_id"))?.clone();
        let experiment_name = tags.get(&metadata_key("experiment_name"))?.clone();
        let run_info = tags
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(RUN_INFO_PREFIX)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .map(|field| (field.to_string(), value.clone()))
            })
            .collect();
        Some(Self {
            experiment_id,
            experiment_name,
            tracking_uri: tags.get(&metadata_key("tracking_uri")).cloned(),
            timestamp: tags
                .get(&metadata_key("timestamp"))
                .and_then(|ts| ts.parse().ok()),
            run_info,
        })
    }
}
