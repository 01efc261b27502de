//! Building a `FeatureSchema` from a training set.

use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{CategoryField, FieldEncoding, Observation, normalize_category};
use crate::error::SchemaError;
use crate::schema::{CategoricalEncoding, FeatureSchema};

/// Encoding choices for both categorical fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    pub crop: FieldEncoding,
    pub location: FieldEncoding,
}

impl SchemaOptions {
    fn for_field(&self, field: CategoryField) -> FieldEncoding {
        match field {
            CategoryField::Crop => self.crop,
            CategoryField::Location => self.location,
        }
    }
}

/// Build a schema from training observations.
///
/// Categories are normalized and enumerated in sorted order so retraining on
/// the same data reproduces the same schema. The reference date is the earliest training date.
pub fn build_schema(observations: &[Observation], opts: &SchemaOptions) -> Result<FeatureSchema, SchemaError> {
    let reference_date = observations
        .iter()
        .map(|o| o.date)
        .min()
        .ok_or(SchemaError::EmptyTrainingSet)?;

    let mut encodings = CategoryField::ALL.iter().map(|&field| {
        let choice = opts.for_field(field);
        let categories: BTreeSet<String> = observations
            .iter()
            .map(|o| normalize_category(field.value_of(o)))
            .collect();
        CategoricalEncoding {
            field,
            kind: choice.kind,
            unseen: choice.resolved_unseen(),
            categories: categories.into_iter().collect(),
        }
    });

    let (Some(crop), Some(location)) = (encodings.next(), encodings.next()) else {
        return Err(SchemaError::Inconsistent("missing categorical field".to_string()));
    };

    let schema = FeatureSchema::from_parts(crop, location, reference_date)?;
    debug!(
        features = schema.len(),
        reference_date = %schema.reference_date(),
        "built feature schema"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncodingKind, UnseenPolicy};
    use chrono::NaiveDate;

    fn obs(y: i32, m: u32, d: u32, crop: &str, location: &str, price: f64) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            crop: crop.to_string(),
            location: location.to_string(),
            price,
            rainfall: None,
            temperature: None,
        }
    }

    fn sample() -> Vec<Observation> {
        vec![
            obs(2022, 3, 1, "Wheat", "Nakuru", 55.0),
            obs(2021, 1, 15, "Maize", "Nairobi", 30.0),
            obs(2022, 6, 1, "Beans", "Nairobi", 90.0),
            obs(2023, 1, 1, "Maize", "Nakuru", 41.0),
        ]
    }

    fn opts(crop: EncodingKind, location: EncodingKind) -> SchemaOptions {
        SchemaOptions {
            crop: FieldEncoding::new(crop),
            location: FieldEncoding::new(location),
        }
    }

    #[test]
    fn one_hot_layout_is_sorted_and_deterministic() {
        let schema = build_schema(&sample(), &opts(EncodingKind::OneHot, EncodingKind::OneHot)).unwrap();
        assert_eq!(
            schema.feature_names(),
            vec![
                "day_offset",
                "crop=Beans",
                "crop=Maize",
                "crop=Wheat",
                "location=Nairobi",
                "location=Nakuru",
                "rainfall",
                "temperature",
            ]
        );

        let mut shuffled = sample();
        shuffled.reverse();
        let again = build_schema(&shuffled, &opts(EncodingKind::OneHot, EncodingKind::OneHot)).unwrap();
        assert_eq!(schema, again);
        assert_eq!(schema.fingerprint(), again.fingerprint());
    }

    #[test]
    fn ordinal_layout_uses_one_column_per_field() {
        let schema = build_schema(&sample(), &opts(EncodingKind::Ordinal, EncodingKind::Ordinal)).unwrap();
        assert_eq!(
            schema.feature_names(),
            vec!["day_offset", "crop", "location", "rainfall", "temperature"]
        );
        assert_eq!(schema.encode(CategoryField::Crop, "Beans"), Some(0));
        assert_eq!(schema.encode(CategoryField::Crop, "Wheat"), Some(2));
        assert_eq!(schema.decode(CategoryField::Location, 1), Some("Nakuru"));
        assert_eq!(schema.encode(CategoryField::Crop, "Rice"), None);
    }

    #[test]
    fn categories_are_normalized_before_enumeration() {
        let rows = vec![
            obs(2021, 1, 1, "maize", "nairobi", 30.0),
            obs(2022, 1, 1, " MAIZE", "Nairobi", 40.0),
        ];
        let schema = build_schema(&rows, &opts(EncodingKind::OneHot, EncodingKind::Ordinal)).unwrap();
        assert_eq!(schema.feature_names(), vec!["day_offset", "crop=Maize", "location", "rainfall", "temperature"]);
        assert_eq!(schema.encode(CategoryField::Location, "Nairobi"), Some(0));
    }

    #[test]
    fn reference_date_is_earliest_training_date() {
        let schema = build_schema(&sample(), &opts(EncodingKind::OneHot, EncodingKind::Ordinal)).unwrap();
        assert_eq!(schema.reference_date(), NaiveDate::from_ymd_opt(2021, 1, 15).unwrap());
        assert_eq!(schema.day_offset(NaiveDate::from_ymd_opt(2021, 1, 16).unwrap()), 1);
        assert_eq!(schema.day_offset(NaiveDate::from_ymd_opt(2021, 1, 14).unwrap()), -1);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let err = build_schema(&[], &opts(EncodingKind::OneHot, EncodingKind::OneHot)).unwrap_err();
        assert_eq!(err, SchemaError::EmptyTrainingSet);
    }

    #[test]
    fn ordinal_zero_fill_is_rejected() {
        let options = SchemaOptions {
            crop: FieldEncoding::with_unseen(EncodingKind::Ordinal, UnseenPolicy::ZeroFill),
            location: FieldEncoding::new(EncodingKind::OneHot),
        };
        let err = build_schema(&sample(), &options).unwrap_err();
        assert_eq!(err, SchemaError::OrdinalZeroFill { field: "crop" });
    }

    #[test]
    fn fingerprint_changes_with_policy() {
        let a = build_schema(&sample(), &opts(EncodingKind::OneHot, EncodingKind::OneHot)).unwrap();
        let b = build_schema(
            &sample(),
            &SchemaOptions {
                crop: FieldEncoding::with_unseen(EncodingKind::OneHot, UnseenPolicy::Reject),
                location: FieldEncoding::new(EncodingKind::OneHot),
            },
        )
        .unwrap();
        assert_eq!(a.feature_names(), b.feature_names());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
