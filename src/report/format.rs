//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline and serving code stay free of presentation details
//! - typed outcomes (`InsufficientHistory`, `EmptySeries`, ...) render as
//!   explanatory messages rather than raw internal errors

use std::path::Path;

use crate::domain::{PredictionRequest, PredictionResult, RequestDate, TrendSeries};
use crate::io::artifact::ModelArtifact;
use crate::io::ingest::{IngestedData, RowError};
use crate::models::Regressor;
use crate::trend::{Catalog, ComparisonOutcome, TrendOutcome};

/// Format the training run summary (dataset stats + schema + fit quality).
pub fn format_training_summary(ingest: &IngestedData, artifact: &ModelArtifact, out_path: &Path) -> String {
    let mut out = String::new();
    let stats = &ingest.stats;
    let schema = artifact.schema();

    out.push_str("=== crop - price model training ===\n");
    out.push_str(&format!(
        "Rows: read={} used={} dropped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Dates: [{}, {}] | price=[{:.2}, {:.2}]\n",
        stats.date_min, stats.date_max, stats.price_min, stats.price_max
    ));

    out.push_str("\nFeature schema:\n");
    for field in crate::domain::CategoryField::ALL {
        let enc = schema.encoding(field);
        out.push_str(&format!(
            "- {:<9} {} ({} categories, unseen={})\n",
            field.name(),
            enc.kind.display_name(),
            enc.categories.len(),
            enc.unseen.display_name()
        ));
    }
    out.push_str(&format!("- features  {}\n", schema.len()));
    out.push_str(&format!("- reference {}\n", schema.reference_date()));

    out.push_str("\nModel:\n");
    match artifact.model() {
        Regressor::Linear(m) => {
            out.push_str("- linear (least squares)\n");
            out.push_str(&format!("- intercept: {:.6}\n", m.intercept));
            out.push_str(&format!("- coefficients: {}\n", fmt_vec(&m.coefficients)));
        }
        Regressor::Forest(m) => {
            out.push_str(&format!(
                "- forest: trees={} max_depth={} min_leaf={} seed={}\n",
                m.trees.len(),
                m.params.max_depth,
                m.params.min_leaf,
                m.params.seed
            ));
        }
    }
    out.push_str(&format!("- in-sample RMSE: {:.4}\n", artifact.training().rmse));
    out.push_str(&format!("- fingerprint: {}\n", artifact.schema_fingerprint()));
    out.push_str(&format!("\nArtifact written to {}\n", out_path.display()));

    out
}

/// List the first `max` dropped rows.
pub fn format_row_errors(errors: &[RowError], max: usize) -> String {
    let mut out = String::new();
    if errors.is_empty() {
        return out;
    }
    out.push_str(&format!("Dropped {} row(s):\n", errors.len()));
    for e in errors.iter().take(max) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if errors.len() > max {
        out.push_str(&format!("  ... and {} more\n", errors.len() - max));
    }
    out
}

/// Render one prediction outcome as a user-facing message.
pub fn format_prediction(req: &PredictionRequest, result: &PredictionResult) -> String {
    let when = match req.when {
        RequestDate::Date(d) => d.to_string(),
        RequestDate::Year(y) => y.to_string(),
    };
    match result {
        PredictionResult::Value(v) => {
            format!("Predicted price for {} in {} ({when}): {v:.2}", req.crop, req.location)
        }
        PredictionResult::InsufficientHistory => format!(
            "No prediction available: {} in {} has fewer than 2 historical records.",
            req.crop, req.location
        ),
        PredictionResult::UnknownCategory { field, value } => format!(
            "No prediction available: {field} '{value}' was not present in the training data."
        ),
        PredictionResult::InvalidInput(msg) => format!("Invalid input: {msg}"),
    }
}

/// Render a single-series trend.
pub fn format_trend(outcome: &TrendOutcome, crop: &str, location: &str) -> String {
    match outcome {
        TrendOutcome::Series(series) => {
            let mut out = format!("Average price of {} in {}:\n", series.crop, series.location);
            out.push_str(&format_series_table(series));
            out
        }
        TrendOutcome::EmptySeries => format!("No price records for {crop} in {location}."),
    }
}

/// Render a two-crop comparison on the union of periods.
pub fn format_comparison(outcome: &ComparisonOutcome, first: &str, second: &str, location: &str) -> String {
    let cmp = match outcome {
        ComparisonOutcome::Series(cmp) => cmp,
        ComparisonOutcome::EmptySeries {
            first_empty,
            second_empty,
        } => {
            let missing: Vec<&str> = [(*first_empty, first), (*second_empty, second)]
                .into_iter()
                .filter_map(|(empty, crop)| empty.then_some(crop))
                .collect();
            return format!("No price records for {} in {location}.", missing.join(" or "));
        }
    };

    let a = truncate(&cmp.first.crop, 12);
    let b = truncate(&cmp.second.crop, 12);
    let mut out = format!("Average price in {}:\n", cmp.first.location);
    out.push_str(&format!("{:<12} {:>12} {:>12}", "period", a, b).trim_end().to_string());
    out.push('\n');
    out.push_str(&format!("{:-<12} {:-<12} {:-<12}", "", "", ""));
    out.push('\n');

    let cell = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string());
    for row in cmp.aligned() {
        out.push_str(&format!(
            "{:<12} {:>12} {:>12}",
            row.period.to_string(),
            cell(row.first),
            cell(row.second)
        ));
        out.push('\n');
    }
    out
}

/// Render the available crops, locations and years.
pub fn format_catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    out.push_str(&format!("Crops ({}): {}\n", catalog.crops.len(), catalog.crops.join(", ")));
    out.push_str(&format!(
        "Locations ({}): {}\n",
        catalog.locations.len(),
        catalog.locations.join(", ")
    ));
    let years: Vec<String> = catalog.years.iter().map(i32::to_string).collect();
    out.push_str(&format!("Years ({}): {}\n", years.len(), years.join(", ")));
    if let Some((crop, location)) = catalog.default_trend() {
        out.push_str(&format!("Default selection: {crop} in {location}\n"));
    }
    out
}

fn format_series_table(series: &TrendSeries) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<12} {:>12} {:>6}", "period", "mean_price", "n"));
    out.push('\n');
    out.push_str(&format!("{:-<12} {:-<12} {:-<6}", "", "", ""));
    out.push('\n');
    for p in &series.points {
        out.push_str(&format!(
            "{:<12} {:>12.2} {:>6}",
            p.period.to_string(),
            p.mean_price,
            p.count
        ));
        out.push('\n');
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
