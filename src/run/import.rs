//! Run Importer: a directory tree back into a live run

use std::path::Path;

use super::manifest::{RunManifest, ARTIFACTS_DIR};
use crate::client::{ExperimentTarget, TrackingClient};
use crate::entity::Run;
use crate::provenance;
use crate::Result;

/// Imports exported runs into a tracking server.
///
/// The destination assigns a fresh run id; nothing from the source run id is
/// reused. Tags are replayed verbatim, so provenance recorded at export time
/// travels with the run across any number of hops.
pub struct RunImporter<'a> {
    client: &'a dyn TrackingClient,
}

impl<'a> RunImporter<'a> {
    /// Importer writing to `client`.
    #[must_use]
    pub fn new(client: &'a dyn TrackingClient) -> Self {
        Self { client }
    }

    /// Import the run exported under `input_dir` into `target`.
    ///
    /// Returns the new run as re-read from the destination.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidInput`] when `run.json` is missing
    /// - [`crate::Error::ReservedTag`] for foreign keys in the provenance
    ///   namespace, before the run is created
    /// - [`crate::Error::ParamConflict`] (or a server error) when the
    ///   destination rejects a param; not retried
    /// - any client or IO error
    pub fn import_run(&self, input_dir: &Path, target: &ExperimentTarget) -> Result<Run> {
        let manifest = RunManifest::read(input_dir)?;
        provenance::validate_tags(&manifest.tags)?;
        let _span =
            tracing::info_span!("import_run", source_run_id = %manifest.info.run_id).entered();

        let experiment = target.resolve(self.client)?;
        let run = self.client.create_run(
            experiment.experiment_id(),
            manifest.info.start_time,
            &manifest.tags,
        )?;
        let run_id = run.run_id();

        for (key, value) in &manifest.params {
            self.client.log_param(run_id, key, value)?;
        }
        for metric in &manifest.metrics {
            self.client.log_metric(run_id, metric)?;
        }

        let artifacts_dir = input_dir.join(ARTIFACTS_DIR);
        if artifacts_dir.is_dir() {
            self.client.log_artifacts(run_id, &artifacts_dir, None)?;
        }

        self.client
            .set_terminated(run_id, manifest.info.status, manifest.info.end_time)?;

        tracing::info!(
            run_id,
            experiment_id = experiment.experiment_id(),
            "imported run"
        );
        self.client.get_run(run_id)
    }
}
