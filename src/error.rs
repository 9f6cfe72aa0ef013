//! Error types for mlflow-porter
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Variants fall into the families the export/import engine distinguishes:
//! configuration (`InvalidInput`), transport (`Transport`, `Http`, `Io`),
//! conflicts (`ParamConflict`, `AlreadyExists`), per-version readiness
//! (`VersionNotReady`, `RegistrationFailed`) and comparison (`Mismatch`).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mlflow-porter error types
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed caller input, raised before any server call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested entity does not exist on the server
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (run, experiment, registered model, ...)
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Param already logged on the run with a different value
    #[error("Param '{key}' already set on run {run_id} (existing: '{existing}', attempted: '{attempted}')")]
    ParamConflict {
        /// Run the param was logged against
        run_id: String,
        /// Param name
        key: String,
        /// Value already stored
        existing: String,
        /// Value that was rejected
        attempted: String,
    },

    /// Entity already exists and the caller did not ask to replace it
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Artifact upload/download failure
    #[error("Artifact transfer failed: {0}")]
    Transport(String),

    /// Tracking server returned an error response
    #[error("Tracking server error: HTTP {status} {code}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// MLflow error code (e.g. `RESOURCE_DOES_NOT_EXIST`)
        code: String,
        /// Server-provided message
        message: String,
    },

    /// Model version stayed in `PENDING_REGISTRATION` past the retry budget
    #[error("Model version {name}/{version} not ready after {attempts} attempts")]
    VersionNotReady {
        /// Registered model name
        name: String,
        /// Destination version number
        version: String,
        /// Number of status polls performed
        attempts: u32,
    },

    /// Server reported `FAILED_REGISTRATION` for a model version
    #[error("Model version {name}/{version} failed registration: {message}")]
    RegistrationFailed {
        /// Registered model name
        name: String,
        /// Destination version number
        version: String,
        /// Server status message
        message: String,
    },

    /// Model version source matches neither the Databricks nor the OSS layout
    #[error("Unrecognized model version source '{source_path}' for run {run_id}")]
    UnrecognizedSourcePath {
        /// Original `source` field
        source_path: String,
        /// Run id expected inside the path
        run_id: String,
    },

    /// Tag key inside a reserved namespace that is not a provenance key
    #[error("Tag '{0}' collides with a reserved export/import tag namespace")]
    ReservedTag(String),

    /// Capability not provided by this client
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Source and destination differ where they must match (comparison harness)
    #[error("Mismatch in {field}: source={source_value} destination={destination_value}")]
    Mismatch {
        /// Field or path that was compared
        field: String,
        /// Source-side value
        source_value: String,
        /// Destination-side value
        destination_value: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or wire JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory walk error
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`Error::Mismatch`].
    pub fn mismatch(
        field: impl Into<String>,
        source_value: impl std::fmt::Debug,
        destination_value: impl std::fmt::Debug,
    ) -> Self {
        Self::Mismatch {
            field: field.into(),
            source_value: format!("{source_value:?}"),
            destination_value: format!("{destination_value:?}"),
        }
    }

    /// True for errors that originate from caller input rather than the server.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// True for conflicts the destination server rejected.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ParamConflict { .. } | Self::AlreadyExists(_))
    }
}
