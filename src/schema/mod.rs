//! Feature schema: the immutable mapping from observations to feature vectors.
//!
//! A schema is built once from the training set (`builder`) and then used on
//! both sides of the model: to assemble the training design matrix and to
//! assemble every serving request (`assemble`). Sharing one assembly path is
//! what keeps training and serving features identical.
//!
//! Feature order is fixed:
//!
//! 1. `day_offset` (whole days since the reference date)
//! 2. crop features (`crop=<value>` indicators, or a single `crop` code)
//! 3. location features (same layout as crop)
//! 4. `rainfall`
//! 5. `temperature`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CategoryField, EncodingKind, UnseenPolicy};
use crate::error::SchemaError;

pub mod assemble;
pub mod builder;

pub use assemble::*;
pub use builder::*;

pub const DAY_OFFSET_FEATURE: &str = "day_offset";
pub const RAINFALL_FEATURE: &str = "rainfall";
pub const TEMPERATURE_FEATURE: &str = "temperature";

/// Encoding of one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub field: CategoryField,
    pub kind: EncodingKind,
    pub unseen: UnseenPolicy,
    /// Sorted, de-duplicated values seen at training. Ordinal codes are indices.
    pub categories: Vec<String>,
}

impl CategoricalEncoding {
    /// Ordinal code of `value`, if it was seen at training.
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Inverse of `code_of`.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.categories.get(code).map(String::as_str)
    }

    pub fn indicator_name(&self, value: &str) -> String {
        format!("{}={}", self.field.name(), value)
    }

    /// Resolve a request value against this encoding.
    ///
    /// `Ok(None)` means "unseen, leave the field zeroed" and is only possible
    /// for one-hot fields with the zero-fill policy.
    pub fn resolve(&self, value: &str) -> Result<Option<usize>, SchemaError> {
        match self.code_of(value) {
            Some(code) => Ok(Some(code)),
            None if self.kind == EncodingKind::OneHot && self.unseen == UnseenPolicy::ZeroFill => Ok(None),
            None => Err(SchemaError::UnknownCategory {
                field: self.field.name(),
                value: value.to_string(),
            }),
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.kind == EncodingKind::Ordinal && self.unseen == UnseenPolicy::ZeroFill {
            return Err(SchemaError::OrdinalZeroFill {
                field: self.field.name(),
            });
        }
        if self.categories.is_empty() {
            return Err(SchemaError::Inconsistent(format!(
                "field `{}` has no categories",
                self.field.name()
            )));
        }
        if self.categories.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SchemaError::Inconsistent(format!(
                "categories of `{}` are not sorted and unique",
                self.field.name()
            )));
        }
        Ok(())
    }
}

/// Where a feature's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FeatureSlot {
    DayOffset,
    Indicator { field: CategoryField, category: String },
    Ordinal { field: CategoryField },
    Rainfall,
    Temperature,
}

/// One named feature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub slot: FeatureSlot,
}

/// Immutable description of the model's input vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<Feature>,
    crop: CategoricalEncoding,
    location: CategoricalEncoding,
    reference_date: NaiveDate,
}

impl FeatureSchema {
    pub(crate) fn from_parts(
        crop: CategoricalEncoding,
        location: CategoricalEncoding,
        reference_date: NaiveDate,
    ) -> Result<Self, SchemaError> {
        let features = layout(&crop, &location);
        let schema = Self {
            features,
            crop,
            location,
            reference_date,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn encoding(&self, field: CategoryField) -> &CategoricalEncoding {
        match field {
            CategoryField::Crop => &self.crop,
            CategoryField::Location => &self.location,
        }
    }

    /// Whole days from the reference date. Negative for dates before training.
    pub fn day_offset(&self, date: NaiveDate) -> i64 {
        (date - self.reference_date).num_days()
    }

    /// Ordinal code of `value` in `field`'s enumeration.
    pub fn encode(&self, field: CategoryField, value: &str) -> Option<usize> {
        self.encoding(field).code_of(value)
    }

    /// Category value for an ordinal code.
    pub fn decode(&self, field: CategoryField, code: usize) -> Option<&str> {
        self.encoding(field).decode(code)
    }

    /// Check internal consistency: encodings are valid and the feature list is
    /// exactly the layout their categories imply.
    ///
    /// A deserialized schema that fails this was edited or produced by a
    /// different build and must not be served.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.crop.field != CategoryField::Crop || self.location.field != CategoryField::Location {
            return Err(SchemaError::Inconsistent(
                "categorical encodings are attached to the wrong fields".to_string(),
            ));
        }
        self.crop.validate()?;
        self.location.validate()?;

        let expected = layout(&self.crop, &self.location);
        if expected != self.features {
            return Err(SchemaError::Inconsistent(format!(
                "feature list has {} entries but the encodings imply {}",
                self.features.len(),
                expected.len()
            )));
        }
        Ok(())
    }

    /// Content hash over everything that affects assembly.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.reference_date.to_string().as_bytes());
        for enc in [&self.crop, &self.location] {
            hasher.update(b"\x1f");
            hasher.update(enc.field.name().as_bytes());
            hasher.update(enc.kind.display_name().as_bytes());
            hasher.update(enc.unseen.display_name().as_bytes());
            for c in &enc.categories {
                hasher.update(b"\x1e");
                hasher.update(c.as_bytes());
            }
        }
        for f in &self.features {
            hasher.update(b"\x1d");
            hasher.update(f.name.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// The feature list implied by two categorical encodings.
fn layout(crop: &CategoricalEncoding, location: &CategoricalEncoding) -> Vec<Feature> {
    let mut features = vec![Feature {
        name: DAY_OFFSET_FEATURE.to_string(),
        slot: FeatureSlot::DayOffset,
    }];

    for enc in [crop, location] {
        match enc.kind {
            EncodingKind::OneHot => {
                for c in &enc.categories {
                    features.push(Feature {
                        name: enc.indicator_name(c),
                        slot: FeatureSlot::Indicator {
                            field: enc.field,
                            category: c.clone(),
                        },
                    });
                }
            }
            EncodingKind::Ordinal => features.push(Feature {
                name: enc.field.name().to_string(),
                slot: FeatureSlot::Ordinal { field: enc.field },
            }),
        }
    }

    features.push(Feature {
        name: RAINFALL_FEATURE.to_string(),
        slot: FeatureSlot::Rainfall,
    });
    features.push(Feature {
        name: TEMPERATURE_FEATURE.to_string(),
        slot: FeatureSlot::Temperature,
    });
    features
}
