//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during training and serving
//! - persisted inside a model artifact (JSON)
//! - handed to a rendering layer as plain series

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Day-of-year a bare request year is normalized to (1 July).
pub const YEAR_ANCHOR_MONTH: u32 = 7;
pub const YEAR_ANCHOR_DAY: u32 = 1;

/// How a categorical field is turned into numeric features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingKind {
    /// One boolean indicator feature per category seen at training.
    OneHot,
    /// A single integer feature holding the category's rank in the sorted enumeration.
    Ordinal,
}

impl EncodingKind {
    /// Unseen-category policy used when none is configured explicitly.
    pub fn default_unseen(self) -> UnseenPolicy {
        match self {
            EncodingKind::OneHot => UnseenPolicy::ZeroFill,
            EncodingKind::Ordinal => UnseenPolicy::Reject,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            EncodingKind::OneHot => "one-hot",
            EncodingKind::Ordinal => "ordinal",
        }
    }
}

/// What feature assembly does with a category value absent from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UnseenPolicy {
    /// Leave every indicator of the field at 0 and predict without category context.
    ///
    /// Only valid for one-hot fields.
    ZeroFill,
    /// Fail the request with `UnknownCategory`.
    Reject,
}

impl UnseenPolicy {
    pub fn display_name(self) -> &'static str {
        match self {
            UnseenPolicy::ZeroFill => "zero-fill",
            UnseenPolicy::Reject => "reject",
        }
    }
}

/// A categorical input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryField {
    Crop,
    Location,
}

impl CategoryField {
    pub const ALL: [CategoryField; 2] = [CategoryField::Crop, CategoryField::Location];

    pub fn name(self) -> &'static str {
        match self {
            CategoryField::Crop => "crop",
            CategoryField::Location => "location",
        }
    }

    pub fn value_of(self, obs: &Observation) -> &str {
        match self {
            CategoryField::Crop => &obs.crop,
            CategoryField::Location => &obs.location,
        }
    }
}

/// Regression algorithm used for the global model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Ordinary least squares with an intercept.
    Linear,
    /// Bagged ensemble of regression trees.
    Forest,
}

impl Algorithm {
    pub fn display_name(self) -> &'static str {
        match self {
            Algorithm::Linear => "linear",
            Algorithm::Forest => "forest",
        }
    }
}

/// Model granularity of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One persisted regressor over the full feature vector.
    Global,
    /// A price ~ year line fit on demand per (crop, location) pair; never persisted.
    Segment,
}

/// How trend observations are grouped into periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeriodMode {
    /// Calendar year.
    Yearly,
    /// The raw observation date.
    Raw,
}

/// A cleaned price observation.
///
/// Rows without a parseable date or a price never become an `Observation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub crop: String,
    /// Market or county name.
    pub location: String,
    pub price: f64,
    pub rainfall: Option<f64>,
    pub temperature: Option<f64>,
}

impl Observation {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Whether this row belongs to the (crop, location) segment.
    ///
    /// `crop` and `location` must be normalized; the row's own values are
    /// normalized here so rows built outside ingest still match.
    pub fn matches(&self, crop: &str, location: &str) -> bool {
        same_category(&self.crop, crop) && same_category(&self.location, location)
    }
}

/// Canonical spelling of a category value: trimmed, whitespace-collapsed and
/// title-cased, where a letter is upper-cased when it does not follow another
/// letter (`"maize-dry"` becomes `"Maize-Dry"`).
///
/// Applied at ingest, at schema build, during feature assembly and to every
/// request, so `" maize"` and `"MAIZE"` both mean `Maize` on every path.
pub fn normalize_category(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, word) in raw.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut prev_letter = false;
        for ch in word.chars() {
            if ch.is_alphabetic() {
                if prev_letter {
                    out.extend(ch.to_lowercase());
                } else {
                    out.extend(ch.to_uppercase());
                }
                prev_letter = true;
            } else {
                out.push(ch);
                prev_letter = false;
            }
        }
    }
    out
}

/// `value` compared against an already-normalized `canonical`.
fn same_category(value: &str, canonical: &str) -> bool {
    value == canonical || normalize_category(value) == canonical
}

/// The time coordinate of a prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDate {
    Date(NaiveDate),
    Year(i32),
}

impl RequestDate {
    /// Calendar date used for the day-offset feature.
    ///
    /// A bare year is pinned to 1 July so every request for that year maps to
    /// the same offset. Returns `None` for years chrono cannot represent.
    pub fn to_date(self) -> Option<NaiveDate> {
        match self {
            RequestDate::Date(d) => Some(d),
            RequestDate::Year(y) => NaiveDate::from_ymd_opt(y, YEAR_ANCHOR_MONTH, YEAR_ANCHOR_DAY),
        }
    }

    pub fn year(self) -> i32 {
        match self {
            RequestDate::Date(d) => d.year(),
            RequestDate::Year(y) => y,
        }
    }
}

/// A typed prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub crop: String,
    pub location: String,
    pub when: RequestDate,
    pub rainfall: Option<f64>,
    pub temperature: Option<f64>,
}

impl PredictionRequest {
    pub fn for_year(crop: &str, location: &str, year: i32) -> Self {
        Self {
            crop: normalize_category(crop),
            location: normalize_category(location),
            when: RequestDate::Year(year),
            rainfall: None,
            temperature: None,
        }
    }
}

/// A prediction request as it arrives from an outer layer (form fields, CLI flags).
///
/// Every field is still text; converting it is where `InvalidInput` originates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPredictionRequest {
    pub crop: String,
    pub location: String,
    pub date: Option<String>,
    pub year: Option<String>,
    pub rainfall: Option<String>,
    pub temperature: Option<String>,
}

/// Outcome of one prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResult {
    /// Predicted price, rounded to 2 decimals.
    Value(f64),
    /// The segment has fewer than 2 historical rows.
    InsufficientHistory,
    /// A rejected category value not seen at training.
    UnknownCategory { field: String, value: String },
    /// Malformed input, or a fit/evaluation that produced no usable number.
    InvalidInput(String),
}

impl PredictionResult {
    pub fn value(&self) -> Option<f64> {
        match self {
            PredictionResult::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// Grouping key of a trend point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Year(i32),
    Day(NaiveDate),
}

impl Period {
    pub fn of(obs: &Observation, mode: PeriodMode) -> Self {
        match mode {
            PeriodMode::Yearly => Period::Year(obs.year()),
            PeriodMode::Raw => Period::Day(obs.date),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{y}"),
            Period::Day(d) => write!(f, "{d}"),
        }
    }
}

/// One aggregated trend point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: Period,
    pub mean_price: f64,
    /// Number of observations averaged into `mean_price`.
    pub count: usize,
}

/// Chronological mean-price series for one (crop, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub crop: String,
    pub location: String,
    pub mode: PeriodMode,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Forest hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_leaf: 1,
            seed: 42,
        }
    }
}

/// Encoding choice for one categorical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEncoding {
    pub kind: EncodingKind,
    /// `None` means "the encoding kind's default".
    pub unseen: Option<UnseenPolicy>,
}

impl FieldEncoding {
    pub fn new(kind: EncodingKind) -> Self {
        Self { kind, unseen: None }
    }

    pub fn with_unseen(kind: EncodingKind, unseen: UnseenPolicy) -> Self {
        Self {
            kind,
            unseen: Some(unseen),
        }
    }

    pub fn resolved_unseen(&self) -> UnseenPolicy {
        self.unseen.unwrap_or_else(|| self.kind.default_unseen())
    }
}

/// A training run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub artifact_path: PathBuf,
    pub algorithm: Algorithm,
    pub crop: FieldEncoding,
    pub location: FieldEncoding,
    pub forest: ForestParams,
}

/// Serving-side configuration.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub data_path: PathBuf,
    pub artifact_path: Option<PathBuf>,
    pub granularity: Granularity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_category_title_cases_words() {
        assert_eq!(normalize_category("maize"), "Maize");
        assert_eq!(normalize_category("  MAIZE "), "Maize");
        assert_eq!(normalize_category("nairobi   west"), "Nairobi West");
        assert_eq!(normalize_category(""), "");
    }

    #[test]
    fn normalize_category_capitalizes_after_punctuation() {
        assert_eq!(normalize_category("maize-dry"), "Maize-Dry");
        assert_eq!(normalize_category("IRISH (WHITE) potatoes"), "Irish (White) Potatoes");
        assert_eq!(normalize_category("uasin-gishu"), "Uasin-Gishu");
        assert_eq!(normalize_category("2nd grade"), "2Nd Grade");
    }

    #[test]
    fn observation_matching_normalizes_the_row() {
        let o = Observation {
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            crop: " maize".to_string(),
            location: "NAIROBI".to_string(),
            price: 30.0,
            rainfall: None,
            temperature: None,
        };
        assert!(o.matches("Maize", "Nairobi"));
        assert!(!o.matches("Beans", "Nairobi"));
    }

    #[test]
    fn unseen_policy_display_names_match_cli_spelling() {
        assert_eq!(UnseenPolicy::ZeroFill.display_name(), "zero-fill");
        assert_eq!(UnseenPolicy::Reject.display_name(), "reject");
    }

    #[test]
    fn year_requests_pin_to_mid_year() {
        let d = RequestDate::Year(2023).to_date().unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
        assert_eq!(RequestDate::Year(2023).year(), 2023);
    }

    #[test]
    fn default_unseen_follows_encoding_kind() {
        assert_eq!(FieldEncoding::new(EncodingKind::OneHot).resolved_unseen(), UnseenPolicy::ZeroFill);
        assert_eq!(FieldEncoding::new(EncodingKind::Ordinal).resolved_unseen(), UnseenPolicy::Reject);
        assert_eq!(
            FieldEncoding::with_unseen(EncodingKind::OneHot, UnseenPolicy::Reject).resolved_unseen(),
            UnseenPolicy::Reject
        );
    }
}
