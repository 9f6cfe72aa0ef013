//! mlflow-porter command-line interface
//!
//! # Commands
//!
//! - `export-run` - Export one run to a directory
//! - `import-run` - Import an exported run into an experiment
//! - `export-model` - Export a registered model and its versions' runs
//! - `import-model` - Import an exported registered model
//!
//! The tracking server comes from `--tracking-uri` / `MLFLOW_TRACKING_URI`
//! (`databricks` uses `DATABRICKS_HOST`). Logging is controlled by
//! `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mlflow_porter::client::{ExperimentTarget, RestClient};
use mlflow_porter::config::ClientConfig;
use mlflow_porter::entity::Stage;
use mlflow_porter::model::{
    ModelExporter, ModelImportOptions, ModelImporter, ReadinessPolicy, VersionSelection,
    DEFAULT_MAX_ATTEMPTS,
};
use mlflow_porter::run::{NotebookFormat, RunExportOptions, RunExporter, RunImporter};

/// Export and import MLflow runs and registered models
#[derive(Parser, Debug)]
#[command(name = "mlflow-porter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tracking server (`http(s)://host:port` or `databricks`)
    #[arg(long, global = true, env = "MLFLOW_TRACKING_URI", default_value = "")]
    tracking_uri: String,

    /// Bearer token (falls back to `DATABRICKS_TOKEN`)
    #[arg(long, global = true, env = "MLFLOW_TRACKING_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Workspace URL when the tracking URI is `databricks`
    #[arg(long, global = true, env = "DATABRICKS_HOST")]
    databricks_host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export one run
    ExportRun {
        /// Run to export
        #[arg(long)]
        run_id: String,
        /// Output directory (cleared first)
        #[arg(long)]
        output_dir: PathBuf,
        /// Record provenance tags on the exported run
        #[arg(long)]
        export_source_tags: bool,
        /// Notebook formats: SOURCE, HTML, JUPYTER, DBC
        #[arg(long, value_delimiter = ',')]
        notebook_formats: Vec<NotebookFormat>,
    },
    /// Import an exported run
    ImportRun {
        /// Directory holding run.json
        #[arg(long)]
        input_dir: PathBuf,
        /// Destination experiment name (created if missing)
        #[arg(long, conflicts_with = "experiment_id", required_unless_present = "experiment_id")]
        experiment_name: Option<String>,
        /// Destination experiment id
        #[arg(long)]
        experiment_id: Option<String>,
    },
    /// Export a registered model
    ExportModel {
        /// Registered model name
        #[arg(long)]
        model: String,
        /// Output directory (cleared first)
        #[arg(long)]
        output_dir: PathBuf,
        /// Only the latest version in each of these stages
        #[arg(long, value_delimiter = ',', conflicts_with = "versions")]
        stages: Option<Vec<Stage>>,
        /// Only these version numbers
        #[arg(long, value_delimiter = ',')]
        versions: Option<Vec<u32>>,
        /// Record provenance tags on the exported runs
        #[arg(long)]
        export_source_tags: bool,
        /// Notebook formats: SOURCE, HTML, JUPYTER, DBC
        #[arg(long, value_delimiter = ',')]
        notebook_formats: Vec<NotebookFormat>,
    },
    /// Import an exported registered model
    ImportModel {
        /// Destination model name
        #[arg(long)]
        model: String,
        /// Directory holding model.json
        #[arg(long)]
        input_dir: PathBuf,
        /// Experiment receiving the versions' runs
        #[arg(long)]
        experiment_name: String,
        /// Delete a same-named destination model first
        #[arg(long)]
        delete_model: bool,
        /// Seconds between readiness polls
        #[arg(long, default_value_t = 5)]
        sleep_time: u64,
        /// Readiness polls per version
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },
}

impl Cli {
    fn client(&self) -> anyhow::Result<RestClient> {
        let token = self
            .token
            .clone()
            .or_else(|| std::env::var("DATABRICKS_TOKEN").ok());
        let config = ClientConfig::resolve(&self.tracking_uri, token, self.databricks_host.clone())
            .context("invalid tracking server configuration")?;
        Ok(RestClient::new(config)?)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let client = cli.client()?;
    match &cli.command {
        Commands::ExportRun {
            run_id,
            output_dir,
            export_source_tags,
            notebook_formats,
        } => {
            let options = RunExportOptions::new()
                .with_source_tags(*export_source_tags)
                .with_notebook_formats(notebook_formats.clone());
            RunExporter::new(&client)
                .with_options(options)
                .export_run(run_id, output_dir)
                .with_context(|| format!("exporting run {run_id}"))?;
            println!("Exported run {run_id} to {}", output_dir.display());
        }
        Commands::ImportRun {
            input_dir,
            experiment_name,
            experiment_id,
        } => {
            let target = match (experiment_name, experiment_id) {
                (_, Some(id)) => ExperimentTarget::id(id.clone()),
                (Some(name), None) => ExperimentTarget::name(name.clone()),
                (None, None) => bail!("--experiment-name or --experiment-id is required"),
            };
            let run = RunImporter::new(&client)
                .import_run(input_dir, &target)
                .with_context(|| format!("importing run from {}", input_dir.display()))?;
            println!("Imported run {} into experiment {}", run.run_id(), run.experiment_id());
        }
        Commands::ExportModel {
            model,
            output_dir,
            stages,
            versions,
            export_source_tags,
            notebook_formats,
        } => {
            let selection = VersionSelection::from_filters(stages.clone(), versions.clone())?;
            let options = RunExportOptions::new()
                .with_source_tags(*export_source_tags)
                .with_notebook_formats(notebook_formats.clone());
            let manifest = ModelExporter::new(&client)
                .with_run_options(options)
                .export_model(model, output_dir, &selection)
                .with_context(|| format!("exporting model {model}"))?;
            println!(
                "Exported model {model} ({} versions) to {}",
                manifest.versions.len(),
                output_dir.display()
            );
        }
        Commands::ImportModel {
            model,
            input_dir,
            experiment_name,
            delete_model,
            sleep_time,
            max_attempts,
        } => {
            let options = ModelImportOptions::new()
                .with_delete_model(*delete_model)
                .with_readiness(ReadinessPolicy::new(
                    Duration::from_secs(*sleep_time),
                    *max_attempts,
                ));
            let report = ModelImporter::new(&client)
                .with_options(options)
                .import_model(model, input_dir, experiment_name)
                .with_context(|| format!("importing model {model}"))?;
            for outcome in &report.versions {
                match &outcome.result {
                    Ok(new) => println!(
                        "  version {} -> {} ({}, run {})",
                        outcome.source_version, new.version, new.stage, new.run_id
                    ),
                    Err(err) => println!("  version {} FAILED: {err}", outcome.source_version),
                }
            }
            let failed = report.failures().count();
            if failed > 0 {
                bail!("{failed} of {} versions failed to import", report.versions.len());
            }
            println!("Imported model {model}");
        }
    }
    Ok(())
}
