//! Per-segment price ~ year fits.
//!
//! A segment is one (crop, location) pair. Its model is a single line fit to
//! the segment's historical (year, price) rows, computed on demand from the
//! current observation snapshot and never persisted.

use tracing::debug;

use crate::domain::Observation;
use crate::error::FitError;
use crate::math::{Line, fit_line};

/// Minimum history a segment needs before it can be fit.
pub const MIN_SEGMENT_ROWS: usize = 2;

/// (year, price) rows of one segment, in input order.
///
/// `crop` and `location` must already be normalized; rows are normalized as
/// they are compared, so raw spellings in the snapshot still match.
pub fn segment_history(observations: &[Observation], crop: &str, location: &str) -> Vec<(i32, f64)> {
    observations
        .iter()
        .filter(|o| o.matches(crop, location))
        .map(|o| (o.year(), o.price))
        .collect()
}

/// Fit price against calendar year.
pub fn fit_year_trend(history: &[(i32, f64)]) -> Result<Line, FitError> {
    if history.len() < MIN_SEGMENT_ROWS {
        return Err(FitError::TooFewRows {
            required: MIN_SEGMENT_ROWS,
            got: history.len(),
        });
    }
    let points: Vec<(f64, f64)> = history.iter().map(|&(y, p)| (f64::from(y), p)).collect();
    let line = fit_line(&points).ok_or(FitError::NonFinite("segment history"))?;
    debug!(rows = history.len(), slope = line.slope, "fit segment trend");
    Ok(line)
}
