//! Run Exporter: one run to a directory tree

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::manifest::{ExportInfo, RunManifest, ARTIFACTS_DIR};
use super::notebook::{notebook_file_name, NotebookFormat, NOTEBOOK_PATH_TAG};
use crate::client::TrackingClient;
use crate::provenance::{self, ProvenanceRecord};
use crate::{Error, Result};

/// Options of a run export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunExportOptions {
    export_source_tags: bool,
    notebook_formats: Vec<NotebookFormat>,
}

impl RunExportOptions {
    /// Default options: no provenance tags, no notebook export.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record provenance tags in the exported tag set.
    #[must_use]
    pub const fn with_source_tags(mut self, enabled: bool) -> Self {
        self.export_source_tags = enabled;
        self
    }

    /// Export the run's notebook in each of `formats`.
    #[must_use]
    pub fn with_notebook_formats(mut self, formats: Vec<NotebookFormat>) -> Self {
        self.notebook_formats = formats;
        self
    }

    /// Whether provenance tags are recorded.
    #[must_use]
    pub const fn export_source_tags(&self) -> bool {
        self.export_source_tags
    }

    /// Requested notebook formats.
    #[must_use]
    pub fn notebook_formats(&self) -> &[NotebookFormat] {
        &self.notebook_formats
    }
}

/// Exports runs from a tracking server.
///
/// Output layout:
///
/// ```text
/// <output_dir>/
///   run.json
///   artifacts/
///     <artifact tree as on the server>
///     notebooks/<name>.<ext>     (Databricks notebook runs only)
/// ```
///
/// `run.json` is written last: a directory without it is an incomplete
/// export.
pub struct RunExporter<'a> {
    client: &'a dyn TrackingClient,
    options: RunExportOptions,
}

impl<'a> RunExporter<'a> {
    /// Exporter with default options.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            client,
            options: RunExportOptions::default(),
        }
    }

    /// Replace the export options.
    #[must_use]
    pub fn with_options(mut self, options: RunExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &RunExportOptions {
        &self.options
    }

    /// Export `run_id` into `output_dir`, clearing it first.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty run id or output path, before
    ///   any server call
    /// - [`Error::ReservedTag`] when the run carries a foreign key inside the
    ///   provenance namespace
    /// - any client or IO error; the export is then incomplete and has no
    ///   `run.json`
    pub fn export_run(&self, run_id: &str, output_dir: &Path) -> Result<RunManifest> {
        if run_id.trim().is_empty() {
            return Err(Error::InvalidInput("run id is required".into()));
        }
        if output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidInput("output directory is required".into()));
        }
        let _span = tracing::info_span!("export_run", run_id).entered();

        super::clear_dir(output_dir)?;
        let run = self.client.get_run(run_id)?;

        provenance::validate_tags(&run.data.tags)?;
        let mut tags = run.data.tags.clone();
        if self.options.export_source_tags {
            let experiment = self.client.get_experiment(run.experiment_id())?;
            ProvenanceRecord::capture(&run.info, experiment.name())
                .with_tracking_uri(self.client.tracking_uri())
                .apply_to(&mut tags);
        }
        provenance::validate_tags(&tags)?;

        let artifacts_dir = output_dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts_dir)?;
        self.client.download_artifacts(run_id, "", &artifacts_dir)?;

        if !self.options.notebook_formats.is_empty() {
            match tags.get(NOTEBOOK_PATH_TAG) {
                Some(notebook) => self.export_notebook(notebook, &artifacts_dir)?,
                None => tracing::debug!("run has no notebook tag, skipping notebook export"),
            }
        }

        let mut export_info = ExportInfo::now(
            self.options.export_source_tags,
            self.options.notebook_formats.clone(),
        );
        export_info.source_tracking_uri = Some(self.client.tracking_uri().to_string());

        let manifest = RunManifest {
            export_info,
            info: run.info,
            params: run.data.params,
            metrics: run.data.metrics.into_values().collect(),
            tags,
        };
        manifest.write(output_dir)?;

        tracing::info!(
            run_id,
            params = manifest.params.len(),
            metrics = manifest.metrics.len(),
            artifacts = count_files(&artifacts_dir),
            "exported run"
        );
        Ok(manifest)
    }

    fn export_notebook(&self, notebook: &str, artifacts_dir: &Path) -> Result<()> {
        let dir = artifacts_dir.join("notebooks");
        fs::create_dir_all(&dir)?;
        for &format in &self.options.notebook_formats {
            let content = self.client.export_notebook(notebook, format)?;
            fs::write(dir.join(notebook_file_name(notebook, format)), content)?;
            tracing::debug!(notebook, %format, "exported notebook");
        }
        Ok(())
    }
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}
