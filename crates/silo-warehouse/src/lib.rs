//! Silo Warehouse - Google Cloud backends for the pipeline
//!
//! - [`gcs`] - Cloud Storage bucket holding uploaded batch files
//! - [`bigquery`] - BigQuery table provisioning and load jobs

pub mod bigquery;
pub mod gcs;

pub use bigquery::BigQueryWarehouse;
pub use gcs::GcsStore;
