//! Seams to the external services the pipeline drives.
//!
//! The binary wires real clients (search API, Cloud Storage, BigQuery); tests
//! substitute in-memory fakes.

use crate::config::SearchQuery;
use crate::error::AppError;
use crate::models::{Column, LoadReport, LoadRequest, ObjectUri, RawRecord, TableRef};
use async_trait::async_trait;
use std::path::Path;

/// Source of search results.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Fetches one page of results.
    ///
    /// A non-success HTTP status must be reported as
    /// `AppError::UnexpectedStatus`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, AppError>;
}

/// Durable object storage for batch files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads a local file under `name`, overwriting any existing object.
    async fn put_file(&self, local: &Path, name: &str) -> Result<ObjectUri, AppError>;

    /// Returns true once the object is readable.
    async fn exists(&self, name: &str) -> Result<bool, AppError>;
}

/// Analytics warehouse holding the destination table.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Looks up table metadata. `Ok(false)` means "not found"; every other
    /// failure is an error.
    async fn table_exists(&self, table: &TableRef) -> Result<bool, AppError>;

    async fn create_table(&self, table: &TableRef, schema: &[Column]) -> Result<(), AppError>;

    /// Submits a load job and blocks until it finishes.
    ///
    /// Job failures are reported as `AppError::LoadJobError`.
    async fn load(&self, request: &LoadRequest) -> Result<LoadReport, AppError>;
}
