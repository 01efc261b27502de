//! Export trend series to CSV.
//!
//! The export is the numeric payload a rendering layer consumes; it is also
//! easy to open in a spreadsheet.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::TrendSeries;
use crate::error::AppError;
use crate::trend::Comparison;

/// Write one series as `period,mean_price,count` rows.
pub fn write_trend_csv(path: &Path, series: &TrendSeries) -> Result<(), AppError> {
    let file = create(path)?;
    write_trend(file, series).map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))
}

/// Write a comparison on the union of periods; a side without data is left blank.
pub fn write_comparison_csv(path: &Path, comparison: &Comparison) -> Result<(), AppError> {
    let file = create(path)?;
    write_comparison(file, comparison).map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))
}

pub fn write_trend<W: Write>(out: W, series: &TrendSeries) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(["crop", "location", "period", "mean_price", "count"])?;
    for p in &series.points {
        w.write_record([
            series.crop.clone(),
            series.location.clone(),
            p.period.to_string(),
            format!("{:.4}", p.mean_price),
            p.count.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_comparison<W: Write>(out: W, comparison: &Comparison) -> Result<(), csv::Error> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record([
        "period",
        comparison.first.crop.as_str(),
        comparison.second.crop.as_str(),
    ])?;
    let cell = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_default();
    for row in comparison.aligned() {
        w.write_record([row.period.to_string(), cell(row.first), cell(row.second)])?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Period, PeriodMode, TrendPoint};

    fn series(crop: &str, points: &[(i32, f64)]) -> TrendSeries {
        TrendSeries {
            crop: crop.to_string(),
            location: "Nairobi".to_string(),
            mode: PeriodMode::Yearly,
            points: points
                .iter()
                .map(|&(y, p)| TrendPoint {
                    period: Period::Year(y),
                    mean_price: p,
                    count: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn trend_csv_has_one_row_per_period() {
        let mut buf = Vec::new();
        write_trend(&mut buf, &series("Maize", &[(2021, 30.0), (2022, 40.5)])).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "crop,location,period,mean_price,count\n\
             Maize,Nairobi,2021,30.0000,1\n\
             Maize,Nairobi,2022,40.5000,1\n"
        );
    }

    #[test]
    fn comparison_csv_leaves_missing_side_blank() {
        let cmp = Comparison {
            first: series("Maize", &[(2021, 30.0)]),
            second: series("Beans", &[(2022, 90.0)]),
        };
        let mut buf = Vec::new();
        write_comparison(&mut buf, &cmp).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "period,Maize,Beans\n2021,30.0000,\n2022,,90.0000\n");
    }
}
