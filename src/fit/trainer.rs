//! Global model training.
//!
//! Given cleaned observations:
//! - build the feature schema (sorted category enumerations, reference date)
//! - assemble the design matrix through the schema, the same path serving uses
//! - fit the configured regressor against the price column
//! - package schema + model into one validated artifact

use tracing::info;

use crate::domain::{Algorithm, ForestParams, Observation, TrainConfig};
use crate::error::AppError;
use crate::io::artifact::{ModelArtifact, TrainingSummary};
use crate::models::Regressor;
use crate::schema::{FeatureInput, FeatureSchema, SchemaOptions, build_schema};

/// Everything the trainer needs besides the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub algorithm: Algorithm,
    pub schema: SchemaOptions,
    pub forest: ForestParams,
}

impl From<&TrainConfig> for TrainOptions {
    fn from(config: &TrainConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            schema: SchemaOptions {
                crop: config.crop,
                location: config.location,
            },
            forest: config.forest,
        }
    }
}

/// Assemble the design matrix for `observations`.
pub fn design_matrix(schema: &FeatureSchema, observations: &[Observation]) -> Result<Vec<Vec<f64>>, AppError> {
    observations
        .iter()
        .map(|o| schema.assemble(&FeatureInput::from(o)).map_err(AppError::from))
        .collect()
}

/// Train a global model and return the artifact (not yet written).
pub fn train(observations: &[Observation], opts: &TrainOptions) -> Result<ModelArtifact, AppError> {
    let schema = build_schema(observations, &opts.schema)?;
    let rows = design_matrix(&schema, observations)?;
    let prices: Vec<f64> = observations.iter().map(|o| o.price).collect();

    info!(
        rows = rows.len(),
        features = schema.len(),
        algorithm = opts.algorithm.display_name(),
        "fitting global model"
    );
    let model = Regressor::fit(opts.algorithm, &rows, &prices, &opts.forest)?;

    let rmse = in_sample_rmse(&model, &rows, &prices)?;
    let training = summarize(observations, rmse);
    info!(rmse = training.rmse, "global model fitted");

    Ok(ModelArtifact::new(schema, model, training)?)
}

fn in_sample_rmse(model: &Regressor, rows: &[Vec<f64>], prices: &[f64]) -> Result<f64, AppError> {
    let mut sse = 0.0;
    for (row, y) in rows.iter().zip(prices) {
        let r = y - model.predict(row)?;
        sse += r * r;
    }
    Ok((sse / rows.len().max(1) as f64).sqrt())
}

fn summarize(observations: &[Observation], rmse: f64) -> TrainingSummary {
    let dates = observations.iter().map(|o| o.date);
    let prices = observations.iter().map(|o| o.price);
    TrainingSummary {
        rows_used: observations.len(),
        rmse,
        date_min: dates.clone().min().unwrap_or_default(),
        date_max: dates.max().unwrap_or_default(),
        price_min: prices.clone().fold(f64::INFINITY, f64::min),
        price_max: prices.fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncodingKind, FieldEncoding};
    use chrono::NaiveDate;

    fn obs(y: i32, crop: &str, location: &str, price: f64) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            crop: crop.to_string(),
            location: location.to_string(),
            price,
            rainfall: None,
            temperature: None,
        }
    }

    fn options(algorithm: Algorithm, kind: EncodingKind) -> TrainOptions {
        TrainOptions {
            algorithm,
            schema: SchemaOptions {
                crop: FieldEncoding::new(kind),
                location: FieldEncoding::new(kind),
            },
            forest: ForestParams {
                n_trees: 10,
                ..ForestParams::default()
            },
        }
    }

    fn data() -> Vec<Observation> {
        vec![
            obs(2021, "Maize", "Nairobi", 30.0),
            obs(2022, "Maize", "Nairobi", 32.0),
            obs(2023, "Maize", "Nairobi", 34.0),
            obs(2021, "Beans", "Nakuru", 80.0),
            obs(2022, "Beans", "Nakuru", 82.0),
            obs(2023, "Beans", "Nakuru", 84.0),
        ]
    }

    #[test]
    fn linear_training_produces_a_paired_artifact() {
        let artifact = train(&data(), &options(Algorithm::Linear, EncodingKind::OneHot)).unwrap();
        assert_eq!(artifact.model().algorithm(), Algorithm::Linear);
        assert_eq!(artifact.model().n_features(), artifact.schema().len());
        assert_eq!(artifact.schema_fingerprint(), artifact.schema().fingerprint());
        assert_eq!(artifact.training().rows_used, 6);
        assert_eq!(artifact.training().price_min, 30.0);
        assert_eq!(artifact.training().price_max, 84.0);
        assert!(artifact.training().rmse < 1e-6, "rmse {}", artifact.training().rmse);
    }

    #[test]
    fn forest_training_is_reproducible() {
        let opts = options(Algorithm::Forest, EncodingKind::Ordinal);
        let a = train(&data(), &opts).unwrap();
        let b = train(&data(), &opts).unwrap();
        assert_eq!(a.model(), b.model());
        assert_eq!(a.schema(), b.schema());
    }

    #[test]
    fn design_matrix_rows_match_schema_width() {
        let opts = options(Algorithm::Linear, EncodingKind::OneHot);
        let schema = build_schema(&data(), &opts.schema).unwrap();
        let rows = design_matrix(&schema, &data()).unwrap();
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.len() == schema.len()));
    }

    #[test]
    fn empty_training_set_fails_with_no_data_code() {
        let err = train(&[], &options(Algorithm::Linear, EncodingKind::OneHot)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
