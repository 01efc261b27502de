//! Shared pipeline logic used by every command.
//!
//! Keeping this in one place avoids duplicating the core workflows:
//! - training: CSV ingest -> schema -> design matrix -> fit -> artifact write
//! - serving: CSV ingest (+ artifact load) -> immutable `ServingContext`
//!
//! The command handlers in `app` then only deal with presentation.

use std::path::Path;

use tracing::info;

use crate::domain::{ServeConfig, TrainConfig};
use crate::error::AppError;
use crate::fit::{TrainOptions, train};
use crate::io::artifact::{ModelArtifact, read_artifact, write_artifact};
use crate::io::ingest::{IngestedData, load_observations};
use crate::serve::ServingContext;

/// All computed outputs of a single `crop train` run.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub ingest: IngestedData,
    pub artifact: ModelArtifact,
}

/// Ingest, fit and atomically write the artifact.
pub fn run_training(config: &TrainConfig) -> Result<TrainingRun, AppError> {
    let ingest = load_observations(&config.data_path)?;
    run_training_on(config, ingest)
}

/// Fit and write from already-ingested data.
pub fn run_training_on(config: &TrainConfig, ingest: IngestedData) -> Result<TrainingRun, AppError> {
    let artifact = train(&ingest.observations, &TrainOptions::from(config))?;
    write_artifact(&config.artifact_path, &artifact)?;
    Ok(TrainingRun { ingest, artifact })
}

/// Build the serving context a process answers requests from.
///
/// The artifact (when configured) is loaded and validated first, so a bad
/// pairing aborts startup before any data is read.
pub fn load_context(config: &ServeConfig) -> Result<ServingContext, AppError> {
    let artifact = config.artifact_path.as_deref().map(load_artifact).transpose()?;
    let ingest = load_observations(&config.data_path)?;
    ServingContext::new(config.granularity, ingest.observations, artifact)
}

fn load_artifact(path: &Path) -> Result<ModelArtifact, AppError> {
    let artifact = read_artifact(path)?;
    info!(
        path = %path.display(),
        algorithm = artifact.model().algorithm().display_name(),
        features = artifact.schema().len(),
        created_at = %artifact.created_at(),
        "loaded model artifact"
    );
    Ok(artifact)
}
