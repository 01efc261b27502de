//! Regression models for the global price model.
//!
//! Models are plain serializable parameter sets so they can be persisted inside
//! an artifact and evaluated without any training state.

pub mod forest;
pub mod model;

pub use forest::*;
pub use model::*;
