//! Run export and import
//!
//! [`RunExporter`] writes one run (info, params, metrics, tags, artifacts,
//! optionally its notebook) to a directory; [`RunImporter`] replays that
//! directory against a destination server under a new run id.
//!
//! # Example
//!
//! ```rust
//! use mlflow_porter::client::{ExperimentTarget, InMemoryTrackingServer, TrackingClient};
//! use mlflow_porter::run::{RunExportOptions, RunExporter, RunImporter};
//!
//! # fn main() -> mlflow_porter::Result<()> {
//! let source = InMemoryTrackingServer::new();
//! let run = source.create_run("0", 0, &Default::default())?;
//! source.log_param(run.run_id(), "alpha", "0.5")?;
//!
//! let dir = tempfile::tempdir()?;
//! RunExporter::new(&source)
//!     .with_options(RunExportOptions::new().with_source_tags(true))
//!     .export_run(run.run_id(), dir.path())?;
//!
//! let dest = InMemoryTrackingServer::new();
//! let imported = RunImporter::new(&dest).import_run(dir.path(), &ExperimentTarget::name("copy"))?;
//! assert_ne!(imported.run_id(), run.run_id());
//! # Ok(())
//! # }
//! ```

mod export;
mod import;
mod manifest;
mod notebook;

pub use export::{RunExportOptions, RunExporter};
pub use import::RunImporter;
pub use manifest::{ExportInfo, RunManifest, ARTIFACTS_DIR, RUN_MANIFEST};
pub use notebook::{notebook_file_name, NotebookFormat, NOTEBOOK_PATH_TAG};

use std::fs;
use std::path::Path;

use crate::Result;

/// Remove everything under `dir` and recreate it empty.
pub(crate) fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}
