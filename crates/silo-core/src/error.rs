use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in the Silo crates returns this enum. Variants map
/// onto the stage of the pipeline where the failure happened, which decides
/// whether the binary aborts or just reports and exits normally.
///
/// # Error Conversion
///
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` → `AppError::IoError`
///
/// # Examples
///
/// ```no_run
/// use silo_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::ConfigError("GCS_BUCKET_NAME is not set".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Required settings are missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Table metadata lookup or creation failed for a reason other than
    /// "not found".
    #[error("Provisioning error: {0}")]
    ProvisioningError(String),

    /// HTTP client request failed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// The search API answered with a non-success status.
    ///
    /// The body is kept verbatim for diagnostics.
    #[error("Search API returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Local filesystem operation failed (scratch directory, batch file,
    /// env file).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Object store upload or lookup failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The uploaded object did not become visible before the deadline.
    #[error("Object {0} not visible after {1} seconds")]
    ObjectNotVisible(String, u64),

    /// The bulk-load job could not be submitted or finished with an error.
    #[error("Load job error: {0}")]
    LoadJobError(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Config,
    Provisioning,
    Fetch,
    Staging,
    Upload,
    Load,
    Other,
}

impl AppError {
    /// Returns the pipeline stage this error originates from.
    pub fn stage(&self) -> ErrorStage {
        match self {
            AppError::ConfigError(_) => ErrorStage::Config,
            AppError::ProvisioningError(_) => ErrorStage::Provisioning,
            AppError::ClientError(_)
            | AppError::UnexpectedStatus { .. }
            | AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::InvalidUrl(_) => ErrorStage::Fetch,
            AppError::SerializationError(_) | AppError::IoError(_) => ErrorStage::Staging,
            AppError::StorageError(_) | AppError::ObjectNotVisible(..) => ErrorStage::Upload,
            AppError::LoadJobError(_) => ErrorStage::Load,
            AppError::Generic(_) => ErrorStage::Other,
        }
    }

    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ConfigError(msg) => {
                format!("{}\n   Set the missing keys in .env or the environment.", msg)
            }
            AppError::ProvisioningError(msg) => {
                if msg.contains("403") || msg.contains("Permission") {
                    format!(
                        "Cannot access the destination table: {}\n   Check that the service account has BigQuery permissions.",
                        msg
                    )
                } else {
                    format!("Cannot provision destination table: {}", msg)
                }
            }
            AppError::UnexpectedStatus { status, body } => {
                format!("Failed to retrieve data from the API: {} {}", status, body)
            }
            AppError::StorageError(msg) => {
                if msg.contains("401") || msg.contains("403") {
                    format!(
                        "Upload rejected: {}\n   Check GOOGLE_APPLICATION_CREDENTIALS and bucket permissions.",
                        msg
                    )
                } else {
                    format!("Upload failed: {}", msg)
                }
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The server may be overloaded. Try again later.",
                    secs
                )
            }
            _ => self.to_string(),
        }
    }
}
