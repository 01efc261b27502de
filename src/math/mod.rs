//! Mathematical utilities: least squares and single-variable line fits.

pub mod line;
pub mod ols;

pub use line::*;
pub use ols::*;
