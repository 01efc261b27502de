//! Reporting utilities: terminal rendering of training runs, predictions and trends.

pub mod format;

pub use format::*;
