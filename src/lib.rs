//! `smard-ingest` library crate.
//!
//! The binary (`smard`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes or hitting the network
//! - the store and the remote source can be swapped behind their traits

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod store;
