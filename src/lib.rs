//! `crop-prices` library crate.
//!
//! The binary (`crop`) is a thin wrapper around this library so that:
//!
//! - training and serving are testable without spawning processes
//! - a different front-end (web form, notebook) can reuse the same pipeline
//! - a trained artifact is loaded by the same code that wrote it

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod schema;
pub mod serve;
pub mod trend;
