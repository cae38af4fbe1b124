//! Silo CLI - Command-line interface for the Silo pipeline
//!
//! This crate provides the `silo` binary that wires the search client, the
//! Cloud Storage and BigQuery backends, and the core pipeline together.

pub mod config;

pub use config::{env_file_path, Command, Config, SchemaPolicyArg, SearchArgs};
