//! Serving side: prediction requests, trend queries and the shared context they run against.
//!
//! - `context`: the immutable snapshot (observations + optional artifact) and its reloadable handle
//! - `service`: request parsing and the global/segment prediction paths

pub mod context;
pub mod service;

pub use context::*;
pub use service::*;
