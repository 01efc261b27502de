//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`EncodingKind`, `UnseenPolicy`, `Algorithm`, `Granularity`, `PeriodMode`)
//! - cleaned price observations (`Observation`)
//! - prediction requests and their typed outcomes (`PredictionRequest`, `PredictionResult`)
//! - trend outputs (`TrendSeries`, `TrendPoint`, `Period`)

pub mod types;

pub use types::*;
