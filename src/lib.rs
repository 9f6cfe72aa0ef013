//! # mlflow-porter: MLflow Run and Model Migration
//!
//! **Version**: 0.1.0
//!
//! Exports MLflow runs and registered models from one tracking server into
//! a directory-based interchange format, and imports them into another
//! (OSS or Databricks). Identifiers are reassigned by the destination; the
//! engine stitches the new run → new model version → stage chain back
//! together.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke**: reserved provenance tags are validated at write time;
//!   configuration errors fail before any server call
//! - **Jidoka**: the [`compare`] harness stops on the first divergence
//!   between source and destination
//! - **Genchi Genbutsu**: every server interaction goes through the
//!   [`client::TrackingClient`] seam, testable against an in-memory server
//! - **Heijunka**: readiness polling is bounded and per-version failures do
//!   not stop the rest of a model import
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mlflow_porter::client::RestClient;
//! use mlflow_porter::config::ClientConfig;
//! use mlflow_porter::model::{ModelExporter, VersionSelection};
//! use mlflow_porter::entity::Stage;
//! use std::path::Path;
//!
//! let client = RestClient::new(ClientConfig::from_env()?)?;
//! let manifest = ModelExporter::new(&client).export_model(
//!     "sklearn_wine",
//!     Path::new("out/sklearn_wine"),
//!     &VersionSelection::Stages(vec![Stage::Production, Stage::Staging]),
//! )?;
//! println!("exported {} versions", manifest.versions.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod client;
pub mod compare;
pub mod config;
pub mod entity;
pub mod error;
pub mod model;
pub mod provenance;
pub mod run;

pub use error::{Error, Result};
