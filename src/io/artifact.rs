//! Read/write model artifacts.
//!
//! An artifact is the single portable unit a serving process loads:
//! - the feature schema and its fingerprint
//! - the fitted regressor
//! - version, timestamp and a short training summary
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the target, so a reader sees either the old artifact or the
//! new one and never a half-written file. Loads validate the schema/model
//! pairing before anything is served.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Granularity;
use crate::error::ArtifactError;
use crate::models::Regressor;
use crate::schema::FeatureSchema;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
const TOOL: &str = "crop-prices";

/// Summary of the data a model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rows_used: usize,
    pub rmse: f64,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub price_min: f64,
    pub price_max: f64,
}

/// A paired (schema, model) unit.
///
/// Fields are private: an artifact can only be obtained through `new` or
/// `read_artifact`, both of which check the pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    format_version: u32,
    created_at: DateTime<Utc>,
    granularity: Granularity,
    schema: FeatureSchema,
    schema_fingerprint: String,
    model: Regressor,
    training: TrainingSummary,
}

impl ModelArtifact {
    pub fn new(schema: FeatureSchema, model: Regressor, training: TrainingSummary) -> Result<Self, ArtifactError> {
        let schema_fingerprint = schema.fingerprint();
        let artifact = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            granularity: Granularity::Global,
            schema,
            schema_fingerprint,
            model,
            training,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    pub fn model(&self) -> &Regressor {
        &self.model
    }

    pub fn training(&self) -> &TrainingSummary {
        &self.training
    }

    /// Check that schema and model belong together.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: self.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        if self.granularity != Granularity::Global {
            return Err(ArtifactError::SchemaArtifactMismatch(
                "only global models are persisted; segment models are fit at serving time".to_string(),
            ));
        }
        self.schema
            .validate()
            .map_err(|e| ArtifactError::SchemaArtifactMismatch(e.to_string()))?;

        let actual = self.schema.fingerprint();
        if actual != self.schema_fingerprint {
            return Err(ArtifactError::SchemaArtifactMismatch(format!(
                "schema fingerprint {actual} does not match recorded {}",
                self.schema_fingerprint
            )));
        }
        if self.model.n_features() != self.schema.len() {
            return Err(ArtifactError::SchemaArtifactMismatch(format!(
                "model expects {} features but the schema defines {}",
                self.model.n_features(),
                self.schema.len()
            )));
        }
        if let Regressor::Forest(f) = &self.model {
            f.validate().map_err(ArtifactError::SchemaArtifactMismatch)?;
        }
        Ok(())
    }
}

/// On-disk layout. Schema and model are optional here so a file missing one of
/// them is reported as a pairing error rather than a generic parse error.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactFile {
    tool: String,
    format_version: u32,
    created_at: DateTime<Utc>,
    granularity: Granularity,
    schema_fingerprint: String,
    #[serde(default)]
    schema: Option<FeatureSchema>,
    #[serde(default)]
    model: Option<Regressor>,
    training: TrainingSummary,
}

impl TryFrom<ArtifactFile> for ModelArtifact {
    type Error = ArtifactError;

    fn try_from(file: ArtifactFile) -> Result<Self, Self::Error> {
        let (schema, model) = match (file.schema, file.model) {
            (Some(s), Some(m)) => (s, m),
            (None, Some(_)) => {
                return Err(ArtifactError::SchemaArtifactMismatch(
                    "artifact contains a model but no feature schema".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(ArtifactError::SchemaArtifactMismatch(
                    "artifact contains a feature schema but no model".to_string(),
                ));
            }
            (None, None) => {
                return Err(ArtifactError::SchemaArtifactMismatch(
                    "artifact contains neither a feature schema nor a model".to_string(),
                ));
            }
        };

        let artifact = ModelArtifact {
            format_version: file.format_version,
            created_at: file.created_at,
            granularity: file.granularity,
            schema,
            schema_fingerprint: file.schema_fingerprint,
            model,
            training: file.training,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

impl From<&ModelArtifact> for ArtifactFile {
    fn from(a: &ModelArtifact) -> Self {
        Self {
            tool: TOOL.to_string(),
            format_version: a.format_version,
            created_at: a.created_at,
            granularity: a.granularity,
            schema_fingerprint: a.schema_fingerprint.clone(),
            schema: Some(a.schema.clone()),
            model: Some(a.model.clone()),
            training: a.training.clone(),
        }
    }
}

/// Write an artifact, atomically replacing any existing file at `path`.
pub fn write_artifact(path: &Path, artifact: &ModelArtifact) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &ArtifactFile::from(artifact))?;
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    info!(
        path = %path.display(),
        fingerprint = artifact.schema_fingerprint(),
        "wrote model artifact"
    );
    Ok(())
}

/// Read and validate an artifact.
pub fn read_artifact(path: &Path) -> Result<ModelArtifact, ArtifactError> {
    let file = File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: ArtifactFile = serde_json::from_reader(BufReader::new(file))?;
    ModelArtifact::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncodingKind, FieldEncoding, Observation};
    use crate::models::LinearModel;
    use crate::schema::{SchemaOptions, build_schema};

    fn schema() -> FeatureSchema {
        let rows = vec![Observation {
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            crop: "Maize".to_string(),
            location: "Nairobi".to_string(),
            price: 30.0,
            rainfall: None,
            temperature: None,
        }];
        let opts = SchemaOptions {
            crop: FieldEncoding::new(EncodingKind::OneHot),
            location: FieldEncoding::new(EncodingKind::Ordinal),
        };
        build_schema(&rows, &opts).unwrap()
    }

    fn summary() -> TrainingSummary {
        TrainingSummary {
            rows_used: 1,
            rmse: 0.0,
            date_min: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            date_max: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            price_min: 30.0,
            price_max: 30.0,
        }
    }

    fn linear(width: usize) -> Regressor {
        Regressor::Linear(LinearModel {
            intercept: 30.0,
            coefficients: vec![0.0; width],
        })
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let s = schema();
        let artifact = ModelArtifact::new(s.clone(), linear(s.len()), summary()).unwrap();

        write_artifact(&path, &artifact).unwrap();
        let loaded = read_artifact(&path).unwrap();
        assert_eq!(loaded, artifact);

        // Overwrite in place.
        write_artifact(&path, &artifact).unwrap();
        assert!(read_artifact(&path).is_ok());
    }

    #[test]
    fn width_mismatch_is_rejected_at_construction() {
        let s = schema();
        let err = ModelArtifact::new(s.clone(), linear(s.len() + 1), summary()).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaArtifactMismatch(_)));
    }

    #[test]
    fn missing_schema_or_model_is_a_pairing_error() {
        let s = schema();
        let artifact = ModelArtifact::new(s.clone(), linear(s.len()), summary()).unwrap();
        let mut file = ArtifactFile::from(&artifact);
        file.schema = None;
        let err = ModelArtifact::try_from(file).unwrap_err();
        assert!(err.to_string().contains("no feature schema"), "{err}");

        let mut file = ArtifactFile::from(&artifact);
        file.model = None;
        let err = ModelArtifact::try_from(file).unwrap_err();
        assert!(err.to_string().contains("no model"), "{err}");
    }

    #[test]
    fn tampered_fingerprint_is_rejected() {
        let s = schema();
        let artifact = ModelArtifact::new(s.clone(), linear(s.len()), summary()).unwrap();
        let mut file = ArtifactFile::from(&artifact);
        file.schema_fingerprint = "0000".to_string();
        let err = ModelArtifact::try_from(file).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaArtifactMismatch(_)));
    }

    fn forest_file() -> serde_json::Value {
        let s = schema();
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let mut row = vec![0.0; s.len()];
                row[0] = (i % 10) as f64;
                row
            })
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| if r[0] < 5.0 { 30.0 } else { 40.0 }).collect();
        let params = crate::domain::ForestParams {
            n_trees: 3,
            ..Default::default()
        };
        let model = Regressor::fit(crate::domain::Algorithm::Forest, &rows, &y, &params).unwrap();
        let artifact = ModelArtifact::new(s, model, summary()).unwrap();
        serde_json::to_value(ArtifactFile::from(&artifact)).unwrap()
    }

    fn load(json: serde_json::Value) -> Result<ModelArtifact, ArtifactError> {
        ModelArtifact::try_from(serde_json::from_value::<ArtifactFile>(json).unwrap())
    }

    #[test]
    fn tampered_forest_structure_is_rejected() {
        assert!(load(forest_file()).is_ok());

        let mut json = forest_file();
        let root = &mut json["model"]["trees"][0]["nodes"][0];
        assert_eq!(root["node"], "split");
        root["feature"] = serde_json::json!(999);
        let err = load(json).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaArtifactMismatch(_)), "{err}");
        assert!(err.to_string().contains("feature 999"), "{err}");

        let mut json = forest_file();
        json["model"]["trees"][0]["nodes"][0]["left"] = serde_json::json!(0);
        let err = load(json).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaArtifactMismatch(_)), "{err}");
        assert!(err.to_string().contains("child index 0"), "{err}");
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let s = schema();
        let artifact = ModelArtifact::new(s.clone(), linear(s.len()), summary()).unwrap();
        let mut file = ArtifactFile::from(&artifact);
        file.format_version = 99;
        let err = ModelArtifact::try_from(file).unwrap_err();
        assert!(matches!(err, ArtifactError::UnsupportedVersion { found: 99, .. }));
    }
}
