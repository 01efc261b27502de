//! Error types.
//!
//! Library internals return small typed enums (`SchemaError`, `FitError`,
//! `ArtifactError`). The binary boundary works with `AppError`, which carries a
//! process exit code:
//!
//! - `2` input / configuration problems (bad CSV, missing columns, bad flags)
//! - `3` no usable data after ingest
//! - `4` model fitting failures
//! - `5` artifact I/O or schema/model pairing failures

use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised while building or applying a `FeatureSchema`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("cannot build a feature schema from an empty training set")]
    EmptyTrainingSet,
    #[error("field `{field}` uses ordinal encoding, which cannot zero-fill unseen categories (code 0 is a real category)")]
    OrdinalZeroFill { field: &'static str },
    #[error("unknown {field} `{value}` (not seen at training)")]
    UnknownCategory { field: &'static str, value: String },
    #[error("inconsistent schema: {0}")]
    Inconsistent(String),
}

/// Errors raised while fitting or evaluating a regressor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("no training rows")]
    Empty,
    #[error("need at least {required} rows, got {got}")]
    TooFewRows { required: usize, got: usize },
    #[error("feature width mismatch: model expects {expected}, row has {got}")]
    WidthMismatch { expected: usize, got: usize },
    #[error("least-squares system is too ill-conditioned to solve")]
    Singular,
    #[error("invalid forest parameters: {0}")]
    InvalidParams(String),
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Errors raised while writing or loading a model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("schema/model mismatch: {0}")]
    SchemaArtifactMismatch(String),
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        let code = match err {
            SchemaError::EmptyTrainingSet => 3,
            SchemaError::Inconsistent(_) => 5,
            SchemaError::OrdinalZeroFill { .. } | SchemaError::UnknownCategory { .. } => 2,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(4, format!("Model fit failed: {err}"))
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        AppError::new(5, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_map_to_exit_codes() {
        let e: AppError = SchemaError::EmptyTrainingSet.into();
        assert_eq!(e.exit_code(), 3);

        let e: AppError = FitError::Singular.into();
        assert_eq!(e.exit_code(), 4);

        let e: AppError = ArtifactError::SchemaArtifactMismatch("x".to_string()).into();
        assert_eq!(e.exit_code(), 5);
        assert!(e.message().contains("schema/model mismatch"));
    }
}
