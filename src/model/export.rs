//! Model Exporter: a registered model and its versions' runs

use std::fs;
use std::path::Path;

use super::manifest::{ModelManifest, VersionRecord, VERSIONS_DIR};
use crate::client::TrackingClient;
use crate::entity::{ModelVersion, Stage};
use crate::run::{ExportInfo, RunExportOptions, RunExporter};
use crate::{Error, Result};

/// Which versions of a model to export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionSelection {
    /// Latest version in every stage
    #[default]
    Current,
    /// Latest version in each listed stage
    Stages(Vec<Stage>),
    /// Exactly the listed version numbers, whatever their stage
    Versions(Vec<u32>),
}

impl VersionSelection {
    /// Build from the two optional filters, which are mutually exclusive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when both filters are given or a
    /// given filter is empty.
    pub fn from_filters(stages: Option<Vec<Stage>>, versions: Option<Vec<u32>>) -> Result<Self> {
        match (stages, versions) {
            (Some(_), Some(_)) => Err(Error::InvalidInput(
                "stages and versions filters are mutually exclusive".into(),
            )),
            (Some(stages), None) if stages.is_empty() => {
                Err(Error::InvalidInput("stages filter is empty".into()))
            }
            (None, Some(versions)) if versions.is_empty() => {
                Err(Error::InvalidInput("versions filter is empty".into()))
            }
            (Some(stages), None) => Ok(Self::Stages(stages)),
            (None, Some(versions)) => Ok(Self::Versions(versions)),
            (None, None) => Ok(Self::Current),
        }
    }

    fn resolve(&self, client: &dyn TrackingClient, name: &str) -> Result<Vec<ModelVersion>> {
        let mut versions = match self {
            Self::Current => client.get_latest_versions(name, &[])?,
            Self::Stages(stages) => client.get_latest_versions(name, stages)?,
            Self::Versions(numbers) => numbers
                .iter()
                .map(|&number| client.get_model_version(name, number))
                .collect::<Result<_>>()?,
        };
        versions.sort_by_key(|v| v.version);
        versions.dedup_by_key(|v| v.version);
        Ok(versions)
    }
}

/// Exports registered models.
///
/// Output layout:
///
/// ```text
/// <output_dir>/
///   model.json
///   versions/<version>/run.json
///   versions/<version>/artifacts/...
/// ```
pub struct ModelExporter<'a> {
    client: &'a dyn TrackingClient,
    run_options: RunExportOptions,
}

impl<'a> ModelExporter<'a> {
    /// Exporter with default run export options.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self {
            client,
            run_options: RunExportOptions::default(),
        }
    }

    /// Options applied to every version's run export.
    #[must_use]
    pub fn with_run_options(mut self, options: RunExportOptions) -> Self {
        self.run_options = options;
        self
    }

    /// Export `model_name` into `output_dir`, clearing it first.
    ///
    /// Every selected version's backing run is exported before `model.json`
    /// is written; any failure aborts the whole export.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty name or output path
    /// - [`Error::NotFound`] for an unknown model or listed version
    /// - any run export error
    pub fn export_model(
        &self,
        model_name: &str,
        output_dir: &Path,
        selection: &VersionSelection,
    ) -> Result<ModelManifest> {
        if model_name.trim().is_empty() {
            return Err(Error::InvalidInput("model name is required".into()));
        }
        if output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidInput("output directory is required".into()));
        }
        let _span = tracing::info_span!("export_model", model = model_name).entered();

        crate::run::clear_dir(output_dir)?;
        let model = self.client.get_registered_model(model_name)?;
        let versions = selection.resolve(self.client, model_name)?;
        tracing::info!(
            versions = ?versions.iter().map(|v| v.version).collect::<Vec<_>>(),
            ?selection,
            "selected model versions"
        );

        fs::create_dir_all(output_dir.join(VERSIONS_DIR))?;
        let run_exporter = RunExporter::new(self.client).with_options(self.run_options.clone());
        let mut records = Vec::with_capacity(versions.len());
        for version in &versions {
            let record =
                VersionRecord::new(version, VersionRecord::run_export_path_for(version.version));
            run_exporter.export_run(&version.run_id, &record.run_dir(output_dir))?;
            tracing::debug!(version = version.version, run_id = %version.run_id, "exported version");
            records.push(record);
        }

        let mut export_info = ExportInfo::now(
            self.run_options.export_source_tags(),
            self.run_options.notebook_formats().to_vec(),
        );
        export_info.source_tracking_uri = Some(self.client.tracking_uri().to_string());

        let manifest = ModelManifest {
            export_info,
            name: model.name,
            description: model.description,
            tags: model.tags,
            versions: records,
        };
        manifest.write(output_dir)?;
        tracing::info!(model = model_name, versions = manifest.versions.len(), "exported model");
        Ok(manifest)
    }
}
