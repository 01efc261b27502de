//! Command-line parsing for the crop price predictor.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline and serving code. `app` turns these structs into configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Algorithm, EncodingKind, Granularity, PeriodMode, UnseenPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "crop", version, about = "Crop price prediction and trend analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train a global model from a CSV and write the artifact (schema + model).
    Train(TrainArgs),
    /// Predict a price for one (crop, location, date|year).
    Predict(PredictArgs),
    /// Mean price per period for one crop at one location.
    Trend(TrendArgs),
    /// Mean price per period for two crops at the same location.
    Compare(CompareArgs),
    /// List the crops, locations and years present in the data.
    Catalog(DataArgs),
}

/// Where the observations come from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Price CSV (date, crop, market|county, price[, rainfall, temperature]).
    ///
    /// Falls back to `CROP_PRICES_DATA` from the environment or `.env`.
    #[arg(long, value_name = "CSV")]
    pub data: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Where to write the model artifact (JSON).
    #[arg(long, value_name = "JSON", default_value = "model.json")]
    pub out: PathBuf,

    #[arg(long, value_enum, default_value_t = Algorithm::Linear)]
    pub algorithm: Algorithm,

    /// Encoding for the crop field.
    #[arg(long, value_enum, default_value_t = EncodingKind::OneHot)]
    pub crop_encoding: EncodingKind,

    /// Encoding for the location field.
    #[arg(long, value_enum, default_value_t = EncodingKind::OneHot)]
    pub location_encoding: EncodingKind,

    /// Unseen-crop policy (defaults to zero-fill for one-hot, reject for ordinal).
    #[arg(long, value_enum)]
    pub crop_unseen: Option<UnseenPolicy>,

    /// Unseen-location policy.
    #[arg(long, value_enum)]
    pub location_unseen: Option<UnseenPolicy>,

    /// Number of trees (forest only).
    #[arg(long, default_value_t = 100)]
    pub trees: usize,

    /// Maximum tree depth (forest only).
    #[arg(long, default_value_t = 12)]
    pub max_depth: usize,

    /// Minimum rows per leaf (forest only).
    #[arg(long, default_value_t = 1)]
    pub min_leaf: usize,

    /// Random seed for bootstrap sampling (forest only).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Show at most this many dropped rows.
    #[arg(long, default_value_t = 10)]
    pub show_errors: usize,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Global model (requires --artifact) or per-segment trend line.
    #[arg(long, value_enum, default_value_t = Granularity::Segment)]
    pub mode: Granularity,

    /// Model artifact written by `crop train`.
    #[arg(long, value_name = "JSON")]
    pub artifact: Option<PathBuf>,

    #[arg(long)]
    pub crop: String,

    #[arg(long)]
    pub location: String,

    /// Calendar year; normalized to 1 July for the global model.
    #[arg(long, conflicts_with = "date")]
    pub year: Option<String>,

    /// Full date (DD/MM/YYYY, DD-MM-YYYY or YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub rainfall: Option<String>,

    #[arg(long)]
    pub temperature: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct TrendArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long)]
    pub crop: String,

    #[arg(long)]
    pub location: String,

    #[arg(long, value_enum, default_value_t = PeriodMode::Yearly)]
    pub period: PeriodMode,

    /// Write the series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long)]
    pub crop: String,

    /// Second crop to compare against.
    #[arg(long)]
    pub crop2: String,

    #[arg(long)]
    pub location: String,

    #[arg(long, value_enum, default_value_t = PeriodMode::Yearly)]
    pub period: PeriodMode,

    /// Write the aligned comparison to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}
