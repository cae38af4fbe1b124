//! Silo Core - Domain types, error handling, configuration and the
//! fetch-stage-load pipeline.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod provision;
pub mod staging;
pub mod store;

#[cfg(test)]
mod testing;

pub use backend::{ObjectStore, SearchSource, Warehouse};
pub use config::{
    HttpConfig, PipelineConfig, RawSettings, Requirement, SchemaPolicy, SearchQuery, Settings,
};
pub use error::{AppError, ErrorStage};
pub use models::{
    record_schema, Column, ColumnType, LoadReport, LoadRequest, LoadSchema, ObjectUri, RawRecord,
    TableRef, WriteDisposition, RECORD_COLUMNS,
};
pub use pipeline::{Pipeline, RunOutcome, RunSummary};
pub use provision::{ensure_table, ProvisionOutcome, Provisioned};
pub use staging::ScratchFile;
pub use store::{ConfigStore, EnvFileStore};
