//! Input helpers.
//!
//! - YAML configuration loading (`config`)
//! - series payload normalization (`normalize`)

pub mod config;
pub mod normalize;

pub use config::*;
pub use normalize::*;
