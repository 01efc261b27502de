//! Prediction requests.
//!
//! Every failure below this point becomes a `PredictionResult` variant; a
//! request never aborts the process.

use tracing::{debug, warn};

use crate::domain::{
    Observation, PredictionRequest, PredictionResult, RawPredictionRequest, RequestDate, normalize_category,
};
use crate::error::SchemaError;
use crate::fit::{MIN_SEGMENT_ROWS, fit_year_trend, segment_history};
use crate::io::artifact::ModelArtifact;
use crate::io::ingest::parse_date;
use crate::schema::FeatureInput;
use crate::serve::{Backend, ServingContext};

/// Convert raw text fields into a typed request.
///
/// A non-empty `date` wins over `year`; one of them is required.
pub fn parse_request(raw: &RawPredictionRequest) -> Result<PredictionRequest, String> {
    let crop = normalize_category(&raw.crop);
    if crop.is_empty() {
        return Err("crop is required".to_string());
    }
    let location = normalize_category(&raw.location);
    if location.is_empty() {
        return Err("location is required".to_string());
    }

    let date = raw.date.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let year = raw.year.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let when = match (date, year) {
        (Some(d), _) => RequestDate::Date(parse_date(d)?),
        (None, Some(y)) => RequestDate::Year(y.parse::<i32>().map_err(|_| format!("invalid year '{y}'"))?),
        (None, None) => return Err("either a date or a year is required".to_string()),
    };

    Ok(PredictionRequest {
        crop,
        location,
        when,
        rainfall: parse_covariate("rainfall", raw.rainfall.as_deref())?,
        temperature: parse_covariate("temperature", raw.temperature.as_deref())?,
    })
}

fn parse_covariate(name: &str, raw: Option<&str>) -> Result<Option<f64>, String> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("invalid {name} '{s}'")),
    }
}

/// Parse and predict in one step; parse failures are `InvalidInput`.
pub fn predict_raw(ctx: &ServingContext, raw: &RawPredictionRequest) -> PredictionResult {
    match parse_request(raw) {
        Ok(req) => predict(ctx, &req),
        Err(msg) => PredictionResult::InvalidInput(msg),
    }
}

/// Predict a price for `req` using the context's backend.
pub fn predict(ctx: &ServingContext, req: &PredictionRequest) -> PredictionResult {
    let req = PredictionRequest {
        crop: normalize_category(&req.crop),
        location: normalize_category(&req.location),
        ..req.clone()
    };
    let result = match ctx.backend() {
        Backend::Global(artifact) => predict_global(artifact, &req),
        Backend::Segment => predict_segment(ctx.observations(), &req),
    };
    debug!(crop = %req.crop, location = %req.location, ?result, "prediction");
    result
}

fn predict_global(artifact: &ModelArtifact, req: &PredictionRequest) -> PredictionResult {
    let Some(date) = req.when.to_date() else {
        return PredictionResult::InvalidInput(format!("year {} is out of range", req.when.year()));
    };
    let input = FeatureInput {
        crop: &req.crop,
        location: &req.location,
        date,
        rainfall: req.rainfall,
        temperature: req.temperature,
    };

    let row = match artifact.schema().assemble(&input) {
        Ok(row) => row,
        Err(SchemaError::UnknownCategory { field, value }) => {
            return PredictionResult::UnknownCategory {
                field: field.to_string(),
                value,
            };
        }
        Err(e) => return PredictionResult::InvalidInput(e.to_string()),
    };

    match artifact.model().predict(&row) {
        Ok(v) => PredictionResult::Value(round2(v)),
        Err(e) => {
            warn!(error = %e, "global model evaluation failed");
            PredictionResult::InvalidInput(format!("model evaluation failed: {e}"))
        }
    }
}

fn predict_segment(observations: &[Observation], req: &PredictionRequest) -> PredictionResult {
    let history = segment_history(observations, &req.crop, &req.location);
    if history.len() < MIN_SEGMENT_ROWS {
        return PredictionResult::InsufficientHistory;
    }
    let line = match fit_year_trend(&history) {
        Ok(line) => line,
        Err(e) => return PredictionResult::InvalidInput(format!("segment fit failed: {e}")),
    };
    let v = line.eval(f64::from(req.when.year()));
    if v.is_finite() {
        PredictionResult::Value(round2(v))
    } else {
        PredictionResult::InvalidInput("segment model produced a non-finite price".to_string())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Algorithm, EncodingKind, FieldEncoding, ForestParams, Granularity};
    use crate::fit::{TrainOptions, train};
    use crate::schema::SchemaOptions;
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

    fn maize() -> Vec<Observation> {
        vec![obs(2021, "Maize", "Nairobi", 30.0), obs(2022, "Maize", "Nairobi", 40.0)]
    }

    fn segment_ctx(data: Vec<Observation>) -> ServingContext {
        ServingContext::new(Granularity::Segment, data, None).unwrap()
    }

    fn global_ctx(kind: EncodingKind) -> ServingContext {
        global_ctx_on(kind, maize())
    }

    fn global_ctx_on(kind: EncodingKind, data: Vec<Observation>) -> ServingContext {
        let opts = TrainOptions {
            algorithm: Algorithm::Linear,
            schema: SchemaOptions {
                crop: FieldEncoding::new(kind),
                location: FieldEncoding::new(kind),
            },
            forest: ForestParams::default(),
        };
        let artifact = train(&data, &opts).unwrap();
        ServingContext::new(Granularity::Global, data, Some(artifact)).unwrap()
    }

    #[test]
    fn segment_model_extrapolates_from_two_years() {
        let ctx = segment_ctx(maize());
        assert_eq!(
            predict(&ctx, &PredictionRequest::for_year("Maize", "Nairobi", 2023)),
            PredictionResult::Value(50.0)
        );
        assert_eq!(
            predict(&ctx, &PredictionRequest::for_year("maize", "nairobi", 2020)),
            PredictionResult::Value(20.0)
        );
    }

    #[test]
    fn segment_with_one_row_has_insufficient_history() {
        let ctx = segment_ctx(vec![obs(2021, "Maize", "Nairobi", 30.0)]);
        assert_eq!(
            predict(&ctx, &PredictionRequest::for_year("Maize", "Nairobi", 2022)),
            PredictionResult::InsufficientHistory
        );
        assert_eq!(
            predict(&ctx, &PredictionRequest::for_year("Beans", "Nairobi", 2022)),
            PredictionResult::InsufficientHistory
        );
    }

    #[test]
    fn one_hot_unseen_crop_still_predicts() {
        let ctx = global_ctx(EncodingKind::OneHot);
        let result = predict(&ctx, &PredictionRequest::for_year("Wheat", "Nairobi", 2023));
        assert!(result.value().is_some(), "{result:?}");
    }

    #[test]
    fn ordinal_unseen_crop_is_rejected() {
        let ctx = global_ctx(EncodingKind::Ordinal);
        assert_eq!(
            predict(&ctx, &PredictionRequest::for_year("Wheat", "Nairobi", 2023)),
            PredictionResult::UnknownCategory {
                field: "crop".to_string(),
                value: "Wheat".to_string()
            }
        );
    }

    #[test]
    fn lowercase_training_rows_serve_any_spelling() {
        let lowercase = || vec![obs(2021, "maize", "nairobi", 30.0), obs(2022, "maize", "nairobi", 40.0)];

        let global = global_ctx_on(EncodingKind::Ordinal, lowercase());
        for (crop, location) in [("maize", "nairobi"), ("Maize", "Nairobi")] {
            let result = predict(&global, &PredictionRequest::for_year(crop, location, 2023));
            assert!(result.value().is_some(), "{crop}/{location}: {result:?}");
        }

        let segment = segment_ctx(lowercase());
        assert_eq!(
            predict(&segment, &PredictionRequest::for_year("maize", "nairobi", 2023)),
            PredictionResult::Value(50.0)
        );
    }

    #[test]
    fn global_prediction_is_rounded_to_cents() {
        let ctx = global_ctx(EncodingKind::OneHot);
        let v = predict(&ctx, &PredictionRequest::for_year("Maize", "Nairobi", 2022))
            .value()
            .unwrap();
        assert_eq!(v, (v * 100.0).round() / 100.0);
    }

    #[test]
    fn raw_requests_are_validated_before_prediction() {
        let ctx = segment_ctx(maize());
        let base = RawPredictionRequest {
            crop: "maize".to_string(),
            location: "Nairobi".to_string(),
            year: Some("2023".to_string()),
            ..RawPredictionRequest::default()
        };
        assert_eq!(predict_raw(&ctx, &base), PredictionResult::Value(50.0));

        let bad_year = RawPredictionRequest {
            year: Some("twenty".to_string()),
            ..base.clone()
        };
        assert!(matches!(predict_raw(&ctx, &bad_year), PredictionResult::InvalidInput(_)));

        let bad_date = RawPredictionRequest {
            date: Some("31/02/2023".to_string()),
            ..base.clone()
        };
        assert!(matches!(predict_raw(&ctx, &bad_date), PredictionResult::InvalidInput(_)));

        let bad_rain = RawPredictionRequest {
            rainfall: Some("lots".to_string()),
            ..base.clone()
        };
        assert!(matches!(predict_raw(&ctx, &bad_rain), PredictionResult::InvalidInput(_)));

        let no_time = RawPredictionRequest {
            year: None,
            ..base
        };
        assert!(matches!(predict_raw(&ctx, &no_time), PredictionResult::InvalidInput(_)));
    }

    #[test]
    fn date_takes_precedence_over_year() {
        let raw = RawPredictionRequest {
            crop: "Maize".to_string(),
            location: "Nairobi".to_string(),
            date: Some("15/03/2024".to_string()),
            year: Some("2020".to_string()),
            ..RawPredictionRequest::default()
        };
        let req = parse_request(&raw).unwrap();
        assert_eq!(req.when, RequestDate::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
    }
}
