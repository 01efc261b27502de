//! CSV ingest and normalization.
//!
//! This module turns a crop price CSV into a clean set of `Observation`s that
//! every downstream computation can trust.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (same file, same observations, same order)
//! - **Separation of concerns**: no training or aggregation logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Observation, normalize_category};
use crate::error::AppError;

/// Accepted names for the location column, in order of preference.
const LOCATION_COLUMNS: [&str; 2] = ["market", "county"];

/// Summary stats about the observations that survived ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub price_min: f64,
    pub price_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: clean observations + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and normalize a CSV file.
pub fn load_observations(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_observations(file)?;
    info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used,
        "loaded price observations"
    );
    Ok(data)
}

/// Normalize CSV content from any reader.
pub fn read_observations<R: Read>(reader: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let columns = Columns::resolve(&build_header_map(&headers))?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header line, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(
            dropped = row_errors.len(),
            first_line = row_errors[0].line,
            first_error = %row_errors[0].message,
            "dropped invalid rows"
        );
    }

    let rows_used = observations.len();
    let stats = compute_stats(&observations)
        .ok_or_else(|| AppError::new(3, "No valid rows remain after normalization."))?;

    Ok(IngestedData {
        observations,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Column indices resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    crop: usize,
    location: usize,
    price: usize,
    rainfall: Option<usize>,
    temperature: Option<usize>,
}

impl Columns {
    fn resolve(header_map: &HashMap<String, usize>) -> Result<Self, AppError> {
        let required = |name: &str| {
            header_map
                .get(name)
                .copied()
                .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
        };

        let location = LOCATION_COLUMNS
            .iter()
            .find_map(|name| header_map.get(*name).copied())
            .ok_or_else(|| AppError::new(2, "Missing required column: `market` (or `county`)"))?;

        Ok(Self {
            date: required("date")?,
            crop: required("crop")?,
            location,
            price: required("price")?,
            rainfall: header_map.get("rainfall").copied(),
            temperature: header_map.get("temperature").copied(),
        })
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<Observation, String> {
    let date = parse_date(get_required(record, columns.date, "date")?)?;
    let price = parse_opt_f64(get_optional(record, Some(columns.price)))
        .ok_or_else(|| "Missing/invalid `price` value.".to_string())?;

    let crop = normalize_category(get_required(record, columns.crop, "crop")?);
    let location = normalize_category(get_required(record, columns.location, "market")?);

    Ok(Observation {
        date,
        crop,
        location,
        price,
        rainfall: parse_opt_f64(get_optional(record, columns.rainfall)),
        temperature: parse_opt_f64(get_optional(record, columns.temperature)),
    })
}

fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let first = observations.first()?;
    let mut stats = DatasetStats {
        n_rows: observations.len(),
        date_min: first.date,
        date_max: first.date,
        price_min: first.price,
        price_max: first.price,
    };
    for o in &observations[1..] {
        stats.date_min = stats.date_min.min(o.date);
        stats.date_max = stats.date_max.max(o.date);
        stats.price_min = stats.price_min.min(o.price);
        stats.price_max = stats.price_max.max(o.price);
    }
    Some(stats)
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    record.get(idx?).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a calendar date.
///
/// Dates are day-first (`DD/MM/YYYY`, `DD-MM-YYYY`); ISO `YYYY-MM-DD` is also
/// accepted since it cannot be confused with a day-first form.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%Y"];
    let s = s.trim();
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: DD/MM/YYYY, DD-MM-YYYY, DD.MM.YYYY, YYYY-MM-DD."
    ))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
