//! Model Migration: Databricks workspace to OSS tracking server
//!
//! This example moves a registered model with five versions between two
//! in-memory registries, keeping only the Production and Staging versions.
//!
//! Flow (Toyota Way: Jidoka - stop on the first divergence):
//! - Export the latest Production/Staging versions with provenance tags
//! - Import into a fresh registry whose versions register asynchronously
//! - Verify the destination against the source with the comparison harness
//!
//! Run with: cargo run --example model_migration

use std::time::Duration;

use mlflow_porter::client::{InMemoryTrackingServer, TrackingClient};
use mlflow_porter::compare::{compare_models, ComparisonPolicy};
use mlflow_porter::entity::{NewModelVersion, RunStatus, Stage, TagSet};
use mlflow_porter::model::{
    ModelExporter, ModelImportOptions, ModelImporter, ReadinessPolicy, VersionSelection,
};
use mlflow_porter::provenance::ProvenanceRecord;
use mlflow_porter::run::RunExportOptions;

const MODEL: &str = "sklearn_wine";

fn seed_source(server: &InMemoryTrackingServer) -> mlflow_porter::Result<()> {
    let experiment_id = server.create_experiment("/Users/alice/wine_quality")?;
    server.create_registered_model(MODEL, "ElasticNet wine quality model", &TagSet::new())?;

    let stages = [
        Stage::Production,
        Stage::None,
        Stage::Staging,
        Stage::Production,
        Stage::Archived,
    ];
    for (i, stage) in stages.into_iter().enumerate() {
        let run = server.create_run(&experiment_id, 1_700_000_000_000, &TagSet::new())?;
        let run_id = run.run_id();
        server.log_param(run_id, "alpha", &format!("0.{}", i + 1))?;
        server.put_artifact(run_id, "model/MLmodel", b"flavors:\n  sklearn: {}\n")?;
        server.put_artifact(run_id, "model/model.pkl", &[i as u8; 64])?;
        server.set_terminated(run_id, RunStatus::Finished, None)?;

        let source = format!("{}/model", run.info.artifact_uri);
        let version = server.create_model_version(MODEL, &NewModelVersion::new(source, run_id))?;
        server.transition_model_version_stage(MODEL, version.version, stage, false)?;
    }
    Ok(())
}

fn main() -> mlflow_porter::Result<()> {
    println!("=== mlflow-porter: Model Migration ===\n");

    let source = InMemoryTrackingServer::databricks();
    seed_source(&source)?;
    println!("Source registry ({}):", source.tracking_uri());
    for version in source.all_versions(MODEL)? {
        println!("  v{} {:<10} {}", version.version, version.current_stage, version.source);
    }

    let dir = tempfile::tempdir()?;
    let manifest = ModelExporter::new(&source)
        .with_run_options(RunExportOptions::new().with_source_tags(true))
        .export_model(
            MODEL,
            dir.path(),
            &VersionSelection::Stages(vec![Stage::Production, Stage::Staging]),
        )?;
    println!("\nExported {} versions to {}", manifest.versions.len(), dir.path().display());

    let dest = InMemoryTrackingServer::new()
        .with_tracking_uri("http://localhost:5000")
        .with_registration_delay(2);
    let options = ModelImportOptions::new()
        .with_readiness(ReadinessPolicy::new(Duration::from_millis(20), 5));
    let report = ModelImporter::new(&dest)
        .with_options(options)
        .import_model(MODEL, dir.path(), "wine_quality_imported")?;

    println!("\nDestination registry ({}):", dest.tracking_uri());
    for outcome in &report.versions {
        match &outcome.result {
            Ok(new) => {
                println!(
                    "  v{} -> v{} {:<10} {}",
                    outcome.source_version, new.version, new.stage, new.source
                );
                let run = dest.get_run(&new.run_id)?;
                if let Some(origin) = ProvenanceRecord::from_tags(&run.data.tags) {
                    println!(
                        "      origin: experiment '{}' run {}",
                        origin.experiment_name,
                        origin.run_info.get("run_id").map_or("?", String::as_str)
                    );
                }
            }
            Err(err) => println!("  v{} FAILED: {err}", outcome.source_version),
        }
    }

    compare_models(
        &source,
        &dest,
        MODEL,
        MODEL,
        &report.version_pairs(),
        &ComparisonPolicy::default(),
    )?;
    println!("\nComparison passed: params, metrics, tags, artifacts and stages match");
    Ok(())
}
