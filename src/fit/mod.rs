//! Model fitting.
//!
//! Responsibilities:
//!
//! - build the feature schema and design matrix, fit the global regressor (`trainer`)
//! - fit the on-demand price ~ year line for one (crop, location) segment (`segment`)

pub mod segment;
pub mod trainer;

pub use segment::*;
pub use trainer::*;
