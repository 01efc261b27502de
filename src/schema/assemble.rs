//! Fixed-shape feature vector assembly.
//!
//! The vector is produced by walking the schema's feature list and filling each
//! slot, so its length and order always equal the schema's. Training rows and
//! serving requests both go through `FeatureSchema::assemble`.

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::{CategoryField, Observation, normalize_category};
use crate::error::SchemaError;
use crate::schema::{FeatureSchema, FeatureSlot};

/// Inputs needed to assemble one feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInput<'a> {
    pub crop: &'a str,
    pub location: &'a str,
    pub date: NaiveDate,
    pub rainfall: Option<f64>,
    pub temperature: Option<f64>,
}

impl<'a> FeatureInput<'a> {
    pub fn category(&self, field: CategoryField) -> &'a str {
        match field {
            CategoryField::Crop => self.crop,
            CategoryField::Location => self.location,
        }
    }
}

impl<'a> From<&'a Observation> for FeatureInput<'a> {
    fn from(obs: &'a Observation) -> Self {
        Self {
            crop: &obs.crop,
            location: &obs.location,
            date: obs.date,
            rainfall: obs.rainfall,
            temperature: obs.temperature,
        }
    }
}

impl FeatureSchema {
    /// Assemble a feature row for `input`.
    ///
    /// Category values are normalized before lookup, so `"maize"` and
    /// `"Maize"` hit the same slot. Unseen categories follow the field's
    /// policy: zero-fill leaves every indicator of that field at 0, reject
    /// returns `UnknownCategory`. Missing covariates are 0.
    pub fn assemble(&self, input: &FeatureInput<'_>) -> Result<Vec<f64>, SchemaError> {
        let values = CategoryField::ALL.map(|field| normalize_category(input.category(field)));
        let mut codes = [None; 2];
        for ((slot, field), value) in codes.iter_mut().zip(CategoryField::ALL).zip(&values) {
            let value = value.as_str();
            *slot = self.encoding(field).resolve(value)?;
            if slot.is_none() {
                warn!(
                    field = field.name(),
                    value,
                    "unseen category; predicting without this field's context"
                );
            }
        }
        let index = |field: CategoryField| match field {
            CategoryField::Crop => 0,
            CategoryField::Location => 1,
        };
        let code_of = |field: CategoryField| codes[index(field)];

        let day_offset = self.day_offset(input.date) as f64;
        let row = self
            .features()
            .iter()
            .map(|feature| match &feature.slot {
                FeatureSlot::DayOffset => day_offset,
                FeatureSlot::Indicator { field, category } => {
                    if code_of(*field).is_some() && values[index(*field)] == *category {
                        1.0
                    } else {
                        0.0
                    }
                }
                FeatureSlot::Ordinal { field } => code_of(*field).map_or(0.0, |c| c as f64),
                FeatureSlot::Rainfall => input.rainfall.unwrap_or(0.0),
                FeatureSlot::Temperature => input.temperature.unwrap_or(0.0),
            })
            .collect();

        Ok(row)
    }
}
