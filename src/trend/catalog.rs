//! Option lists derived from an observation snapshot.

use std::collections::BTreeSet;

use crate::domain::{Observation, normalize_category};

/// Sorted distinct values available for selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub crops: Vec<String>,
    pub locations: Vec<String>,
    pub years: Vec<i32>,
}

impl Catalog {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let crops: BTreeSet<String> = observations.iter().map(|o| normalize_category(&o.crop)).collect();
        let locations: BTreeSet<String> = observations.iter().map(|o| normalize_category(&o.location)).collect();
        let years: BTreeSet<i32> = observations.iter().map(Observation::year).collect();
        Self {
            crops: crops.into_iter().collect(),
            locations: locations.into_iter().collect(),
            years: years.into_iter().collect(),
        }
    }

    /// Default selection for a single-series view: first crop, first location.
    pub fn default_trend(&self) -> Option<(&str, &str)> {
        Some((self.crops.first()?.as_str(), self.locations.first()?.as_str()))
    }

    /// Default selection for a comparison: the first two crops (or the only
    /// crop twice) at the first location.
    pub fn default_comparison(&self) -> Option<(&str, &str, &str)> {
        let first = self.crops.first()?.as_str();
        let second = self.crops.get(1).map_or(first, String::as_str);
        Some((first, second, self.locations.first()?.as_str()))
    }
}
