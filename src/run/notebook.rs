//! Databricks notebook export formats

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tag Databricks sets on runs launched from a notebook.
pub const NOTEBOOK_PATH_TAG: &str = "mlflow.databricks.notebookPath";

/// Workspace export format of a notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotebookFormat {
    /// Language source file
    Source,
    /// Rendered HTML
    Html,
    /// Jupyter `.ipynb`
    Jupyter,
    /// Databricks archive
    Dbc,
}

impl NotebookFormat {
    /// Wire name used by the workspace export API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Html => "HTML",
            Self::Jupyter => "JUPYTER",
            Self::Dbc => "DBC",
        }
    }

    /// File extension of the exported notebook.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Html => "html",
            Self::Jupyter => "ipynb",
            Self::Dbc => "dbc",
        }
    }

    /// Parse a comma-separated list such as `"SOURCE,html"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown format name.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for NotebookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotebookFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SOURCE" => Ok(Self::Source),
            "HTML" => Ok(Self::Html),
            "JUPYTER" => Ok(Self::Jupyter),
            "DBC" => Ok(Self::Dbc),
            other => Err(Error::InvalidInput(format!("unknown notebook format '{other}'"))),
        }
    }
}

/// Local file name for `notebook_path` exported as `format`.
#[must_use]
pub fn notebook_file_name(notebook_path: &str, format: NotebookFormat) -> String {
    let base = notebook_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("notebook");
    format!("{base}.{}", format.extension())
}
