//! Registered Model and Model Version - registry entities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TagSet;
use crate::{Error, Result};

/// Lifecycle stage of a model version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Not assigned to any stage
    #[default]
    None,
    /// Being tested/validated
    Staging,
    /// Deployed and serving traffic
    Production,
    /// Retired from active use
    Archived,
}

impl Stage {
    /// All stages, in registry display order.
    pub const ALL: [Self; 4] = [Self::None, Self::Staging, Self::Production, Self::Archived];

    /// Get display name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Archived => "Archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    /// Stage names are matched case-insensitively, as the registry does.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown model stage '{s}'")))
    }
}

/// Registration status of a model version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelVersionStatus {
    /// Server is still copying/validating the model artifacts.
    #[default]
    PendingRegistration,
    /// Registration failed; see `status_message`.
    FailedRegistration,
    /// Version is usable.
    Ready,
}

impl ModelVersionStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingRegistration => "PENDING_REGISTRATION",
            Self::FailedRegistration => "FAILED_REGISTRATION",
            Self::Ready => "READY",
        }
    }
}

impl fmt::Display for ModelVersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVersionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING_REGISTRATION" => Ok(Self::PendingRegistration),
            "FAILED_REGISTRATION" => Ok(Self::FailedRegistration),
            "READY" => Ok(Self::Ready),
            other => Err(Error::InvalidInput(format!(
                "unknown model version status '{other}'"
            ))),
        }
    }
}

/// One immutable snapshot of a registered model, bound to the run that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    /// Registered model name
    pub name: String,
    /// Version number (assigned by the registry)
    pub version: u32,
    /// Current stage
    #[serde(default)]
    pub current_stage: Stage,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Registration status
    #[serde(default)]
    pub status: ModelVersionStatus,
    /// Registration status detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// User who created the version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Run that produced the model artifacts
    pub run_id: String,
    /// Artifact path expression embedding `run_id`
    pub source: String,
    /// Version tags
    #[serde(default)]
    pub tags: TagSet,
}

impl ModelVersion {
    /// Create a pending version with the given source.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: u32,
        source: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            current_stage: Stage::None,
            description: String::new(),
            status: ModelVersionStatus::PendingRegistration,
            status_message: None,
            user_id: None,
            run_id: run_id.into(),
            source: source.into(),
            tags: TagSet::new(),
        }
    }
}

/// Request to create a model version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewModelVersion {
    /// Artifact path of the model
    pub source: String,
    /// Run that produced the model
    pub run_id: String,
    /// Description
    pub description: String,
    /// Version tags
    pub tags: TagSet,
}

impl NewModelVersion {
    /// Request with only the required fields.
    #[must_use]
    pub fn new(source: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set version tags
    #[must_use]
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}

/// A named, versioned collection of model artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredModel {
    /// Model name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Model tags
    #[serde(default)]
    pub tags: TagSet,
    /// Latest version per stage, ascending by version number
    #[serde(default)]
    pub latest_versions: Vec<ModelVersion>,
}

impl RegisteredModel {
    /// Create a model with no versions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
