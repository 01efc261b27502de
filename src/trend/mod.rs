//! Trend aggregation over raw observations.
//!
//! Independent of any trained model:
//!
//! - single-series mean price per period (`trend`)
//! - two-crop comparison at one location (`compare`)
//! - option lists for the outer layer (`catalog`)

pub mod aggregate;
pub mod catalog;

pub use aggregate::*;
pub use catalog::*;
