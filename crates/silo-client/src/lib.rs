//! Silo Client - HTTP client for the data.europa.eu search API
//!
//! - [`europa`] - hub search endpoint, result envelope parsing

pub mod europa;

pub use europa::SearchClient;
