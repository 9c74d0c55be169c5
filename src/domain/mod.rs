//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the run configuration (`ConfigSpec`, `FilterSpec`, `TimestampMode`)
//! - the unit of iteration (`Combination`)
//! - persisted records (`TimeSeriesRecord`, `StoredRow`)

pub mod types;

pub use types::*;
