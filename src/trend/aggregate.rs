//! Mean-price series per period.
//!
//! Periods with no observations are absent from a series; nothing is
//! interpolated or zero-filled.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::{Observation, Period, PeriodMode, TrendPoint, TrendSeries, normalize_category};

/// Result of a single-series trend query.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendOutcome {
    Series(TrendSeries),
    /// No observation matched the (crop, location) filter.
    EmptySeries,
}

/// Two independently aggregated series for the same location.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub first: TrendSeries,
    pub second: TrendSeries,
}

/// One row of the union-aligned comparison view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow {
    pub period: Period,
    pub first: Option<f64>,
    pub second: Option<f64>,
}

impl Comparison {
    /// Both series on the union of their periods, ascending.
    ///
    /// A side with no observation for a period is `None`, never a number.
    pub fn aligned(&self) -> Vec<AlignedRow> {
        let first: BTreeMap<Period, f64> = self.first.points.iter().map(|p| (p.period, p.mean_price)).collect();
        let second: BTreeMap<Period, f64> = self.second.points.iter().map(|p| (p.period, p.mean_price)).collect();
        let periods: BTreeSet<Period> = first.keys().chain(second.keys()).copied().collect();

        periods
            .into_iter()
            .map(|period| AlignedRow {
                period,
                first: first.get(&period).copied(),
                second: second.get(&period).copied(),
            })
            .collect()
    }
}

/// Result of a comparison query.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome {
    Series(Comparison),
    /// At least one side had no matching observations.
    EmptySeries { first_empty: bool, second_empty: bool },
}

/// Mean price per period for one (crop, location).
pub fn trend(observations: &[Observation], crop: &str, location: &str, mode: PeriodMode) -> TrendOutcome {
    let series = aggregate(observations, &normalize_category(crop), &normalize_category(location), mode);
    debug!(
        crop = %series.crop,
        location = %series.location,
        points = series.len(),
        "aggregated trend"
    );
    if series.is_empty() {
        TrendOutcome::EmptySeries
    } else {
        TrendOutcome::Series(series)
    }
}

/// Two crops at one location, each aggregated on its own periods.
pub fn compare(
    observations: &[Observation],
    first_crop: &str,
    second_crop: &str,
    location: &str,
    mode: PeriodMode,
) -> ComparisonOutcome {
    let location = normalize_category(location);
    let first = aggregate(observations, &normalize_category(first_crop), &location, mode);
    let second = aggregate(observations, &normalize_category(second_crop), &location, mode);

    if first.is_empty() || second.is_empty() {
        return ComparisonOutcome::EmptySeries {
            first_empty: first.is_empty(),
            second_empty: second.is_empty(),
        };
    }
    ComparisonOutcome::Series(Comparison { first, second })
}

/// Group matching observations by period and average their prices.
///
/// `crop` and `location` must already be normalized; rows are normalized as
/// they are compared, so raw spellings in the snapshot still match.
pub fn aggregate(observations: &[Observation], crop: &str, location: &str, mode: PeriodMode) -> TrendSeries {
    let mut groups: BTreeMap<Period, (f64, usize)> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.matches(crop, location)) {
        let entry = groups.entry(Period::of(obs, mode)).or_insert((0.0, 0));
        entry.0 += obs.price;
        entry.1 += 1;
    }

    let points = groups
        .into_iter()
        .map(|(period, (sum, count))| TrendPoint {
            period,
            mean_price: sum / count as f64,
            count,
        })
        .collect();

    TrendSeries {
        crop: crop.to_string(),
        location: location.to_string(),
        mode,
        points,
    }
}
