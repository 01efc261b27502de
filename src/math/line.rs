//! Single-variable least squares line `y = a + b x`.
//!
//! The fit is kept in centered form (`ȳ + b (x - x̄)`) so evaluating far from
//! the origin (calendar years around 2000) does not lose precision to a huge
//! intercept.

/// A fitted line in centered form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub x_mean: f64,
    pub y_mean: f64,
    pub slope: f64,
}

impl Line {
    pub fn eval(&self, x: f64) -> f64 {
        self.y_mean + self.slope * (x - self.x_mean)
    }

    /// Intercept at `x = 0`.
    pub fn intercept(&self) -> f64 {
        self.y_mean - self.slope * self.x_mean
    }
}

/// Fit `y ~ x` by ordinary least squares.
///
/// Returns `None` for fewer than 2 points or non-finite inputs. When every `x`
/// is identical the slope is 0 and the line sits at the mean of `y`.
pub fn fit_line(points: &[(f64, f64)]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }
    if points.iter().any(|(x, y)| !(x.is_finite() && y.is_finite())) {
        return None;
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for &(x, y) in points {
        let dx = x - x_mean;
        cov += dx * (y - y_mean);
        var += dx * dx;
    }

    let slope = if var <= 1e-18 { 0.0 } else { cov / var };
    if !slope.is_finite() {
        return None;
    }

    Some(Line {
        x_mean,
        y_mean,
        slope,
    })
}
