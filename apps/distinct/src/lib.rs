//! # Distinct
//!
//! Application layer around `distinct-core`: the report ingestion server,
//! per-session workers, configuration and the command-line interface.

pub mod api;
pub mod cli;
pub mod config;
pub mod session;
