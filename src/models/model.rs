//! Model fitting and evaluation dispatch.
//!
//! The trainer relies on two primitive operations:
//! - fit a regressor on an assembled design matrix
//! - predict a price for one assembled row
//!
//! Both check the row width against the model so a schema/model pairing error
//! cannot turn into a silent misread of the feature vector.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{Algorithm, ForestParams};
use crate::error::FitError;
use crate::math::solve_least_squares;
use crate::models::forest::ForestModel;

/// Ordinary least squares with an intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn fit(rows: &[Vec<f64>], y: &[f64]) -> Result<Self, FitError> {
        let width = check_design(rows, y)?;
        let n = rows.len();

        // Leading column of ones for the intercept.
        let mut x = DMatrix::<f64>::zeros(n, width + 1);
        for (i, row) in rows.iter().enumerate() {
            x[(i, 0)] = 1.0;
            for (j, v) in row.iter().enumerate() {
                x[(i, j + 1)] = *v;
            }
        }
        let yv = DVector::from_column_slice(y);

        let beta = solve_least_squares(&x, &yv).ok_or(FitError::Singular)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }
}

/// A fitted price regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum Regressor {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl Regressor {
    /// Fit the chosen algorithm on an assembled design matrix.
    pub fn fit(algorithm: Algorithm, rows: &[Vec<f64>], y: &[f64], forest: &ForestParams) -> Result<Self, FitError> {
        match algorithm {
            Algorithm::Linear => LinearModel::fit(rows, y).map(Regressor::Linear),
            Algorithm::Forest => ForestModel::fit(rows, y, forest).map(Regressor::Forest),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Regressor::Linear(_) => Algorithm::Linear,
            Regressor::Forest(_) => Algorithm::Forest,
        }
    }

    /// Input width the model was trained on.
    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear(m) => m.coefficients.len(),
            Regressor::Forest(m) => m.n_features,
        }
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64, FitError> {
        if row.len() != self.n_features() {
            return Err(FitError::WidthMismatch {
                expected: self.n_features(),
                got: row.len(),
            });
        }
        let y = match self {
            Regressor::Linear(m) => m.predict(row),
            Regressor::Forest(m) => m.predict(row),
        };
        if y.is_finite() {
            Ok(y)
        } else {
            Err(FitError::NonFinite("prediction"))
        }
    }
}

/// Validate a design matrix and return its width.
pub(crate) fn check_design(rows: &[Vec<f64>], y: &[f64]) -> Result<usize, FitError> {
    let Some(first) = rows.first() else {
        return Err(FitError::Empty);
    };
    let width = first.len();
    if y.len() != rows.len() {
        return Err(FitError::WidthMismatch {
            expected: rows.len(),
            got: y.len(),
        });
    }
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(FitError::WidthMismatch {
            expected: width,
            got: bad.len(),
        });
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("features"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("prices"));
    }
    Ok(width)
}
