//! Client configuration
//!
//! Resolves where the REST client connects and how it authenticates, from
//! explicit values (CLI flags) falling back to the environment variables the
//! MLflow and Databricks clients read:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `MLFLOW_TRACKING_URI` | `http(s)://host[:port]` or `databricks` |
//! | `MLFLOW_TRACKING_TOKEN` | Bearer token |
//! | `DATABRICKS_HOST` | Workspace URL when the tracking URI is `databricks` |
//! | `DATABRICKS_TOKEN` | Token fallback |

use std::time::Duration;

use crate::{Error, Result};

/// Default HTTP timeout per request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolved connection settings for [`crate::client::RestClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Tracking URI as given (`databricks`, `http://localhost:5000`, ...)
    pub tracking_uri: String,
    /// Base URL requests are sent to
    pub host: String,
    /// Bearer token, if any
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Resolve from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the tracking URI is empty, uses
    /// an unsupported scheme, or is `databricks` without a host.
    pub fn resolve(
        tracking_uri: &str,
        token: Option<String>,
        databricks_host: Option<String>,
    ) -> Result<Self> {
        let tracking_uri = tracking_uri.trim();
        if tracking_uri.is_empty() {
            return Err(Error::InvalidInput(
                "tracking URI is required (set MLFLOW_TRACKING_URI)".into(),
            ));
        }
        let host = if tracking_uri.starts_with("databricks") {
            databricks_host
                .filter(|h| !h.trim().is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput(
                        "DATABRICKS_HOST is required when the tracking URI is 'databricks'".into(),
                    )
                })?
        } else if tracking_uri.starts_with("http://") || tracking_uri.starts_with("https://") {
            tracking_uri.to_string()
        } else {
            return Err(Error::InvalidInput(format!(
                "unsupported tracking URI '{tracking_uri}' (expected http(s):// or databricks)"
            )));
        };
        Ok(Self {
            tracking_uri: tracking_uri.to_string(),
            host: host.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Resolve from the environment.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::resolve`].
    pub fn from_env() -> Result<Self> {
        let tracking_uri = std::env::var("MLFLOW_TRACKING_URI").unwrap_or_default();
        let token = std::env::var("MLFLOW_TRACKING_TOKEN")
            .or_else(|_| std::env::var("DATABRICKS_TOKEN"))
            .ok();
        let host = std::env::var("DATABRICKS_HOST").ok();
        Self::resolve(&tracking_uri, token, host)
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the target is a Databricks workspace.
    #[must_use]
    pub fn is_databricks(&self) -> bool {
        self.tracking_uri.starts_with("databricks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_oss() {
        let config = ClientConfig::resolve("http://localhost:5000/", None, None).unwrap();
        assert_eq!(config.host, "http://localhost:5000");
        assert!(!config.is_databricks());
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_resolve_databricks_requires_host() {
        let err = ClientConfig::resolve("databricks", Some("dapi".into()), None).unwrap_err();
        assert!(err.is_configuration());

        let config = ClientConfig::resolve(
            "databricks",
            Some("dapi".into()),
            Some("https://example.cloud.databricks.com".into()),
        )
        .unwrap();
        assert!(config.is_databricks());
        assert_eq!(config.host, "https://example.cloud.databricks.com");
        assert_eq!(config.token.as_deref(), Some("dapi"));
    }

    #[test]
    fn test_resolve_rejects_unknown_scheme() {
        assert!(ClientConfig::resolve("file:///tmp/mlruns", None, None).is_err());
        assert!(ClientConfig::resolve("  ", None, None).is_err());
    }

    #[test]
    fn test_empty_token_is_none() {
        let config = ClientConfig::resolve("http://h", Some(String::new()), None).unwrap();
        assert_eq!(config.token, None);
    }
}
