//! Configuration types for Silo components.
//!
//! Settings are resolved once by the entry point (environment, `.env` file,
//! command-line overrides) and handed to every component explicitly.

use crate::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Path to the service-account key file.
pub const CREDENTIALS_KEY: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Object-store bucket receiving batch files.
pub const BUCKET_KEY: &str = "GCS_BUCKET_NAME";
/// Warehouse project id.
pub const PROJECT_KEY: &str = "GCP_PROJECT_ID";
/// Warehouse dataset id.
pub const DATASET_KEY: &str = "BIGQUERY_DATASET_ID";
/// Destination table id. Written back by the provisioner when generated.
pub const TABLE_KEY: &str = "BIGQUERY_TABLE_ID";

/// Default search endpoint of the data.europa.eu hub.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://data.europa.eu/api/hub/search/search";

/// Which settings a command needs before it may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Table provisioning only: credentials, project, dataset.
    Provision,
    /// Full pipeline: everything `Provision` needs plus the bucket.
    FullRun,
}

/// Settings as read from the environment, before validation.
///
/// Empty strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub credentials_path: Option<String>,
    pub bucket: Option<String>,
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,
}

impl RawSettings {
    /// Returns the names of every required key that is unset.
    pub fn missing(&self, requirement: Requirement) -> Vec<&'static str> {
        let mut required = vec![
            (CREDENTIALS_KEY, &self.credentials_path),
            (PROJECT_KEY, &self.project_id),
            (DATASET_KEY, &self.dataset_id),
        ];
        if requirement == Requirement::FullRun {
            required.insert(1, (BUCKET_KEY, &self.bucket));
        }

        required
            .into_iter()
            .filter(|(_, value)| non_empty(value).is_none())
            .map(|(key, _)| key)
            .collect()
    }

    /// Validates the raw values into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` naming all missing keys at once.
    pub fn into_settings(self, requirement: Requirement) -> Result<Settings, AppError> {
        let missing = self.missing(requirement);
        if !missing.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Some environment variables are not set: {}",
                missing.join(", ")
            )));
        }

        let required = |value: Option<String>, key: &str| {
            non_empty(&value)
                .map(str::to_string)
                .ok_or_else(|| AppError::ConfigError(format!("{} is not set", key)))
        };

        Ok(Settings {
            credentials_path: PathBuf::from(required(self.credentials_path, CREDENTIALS_KEY)?),
            project_id: required(self.project_id, PROJECT_KEY)?,
            dataset_id: required(self.dataset_id, DATASET_KEY)?,
            bucket: non_empty(&self.bucket).map(str::to_string),
            table_id: non_empty(&self.table_id).map(str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub project_id: String,
    pub dataset_id: String,
    pub bucket: Option<String>,
    /// `None` means the provisioner generates (and persists) one.
    pub table_id: Option<String>,
}

impl Settings {
    /// Returns the bucket, failing if the settings were validated for
    /// provisioning only.
    pub fn bucket(&self) -> Result<&str, AppError> {
        self.bucket
            .as_deref()
            .ok_or_else(|| AppError::ConfigError(format!("{} is not set", BUCKET_KEY)))
    }
}

/// One page of search results to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    /// Inclusive lower bound.
    pub min_date: DateTime<Utc>,
    /// Inclusive upper bound.
    pub max_date: DateTime<Utc>,
    pub limit: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keyword: "grain trade".to_string(),
            min_date: Utc
                .with_ymd_and_hms(2022, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            max_date: Utc
                .with_ymd_and_hms(2024, 12, 31, 23, 59, 59)
                .single()
                .unwrap_or_default(),
            limit: 100,
        }
    }
}

impl SearchQuery {
    /// Rejects empty keywords, inverted ranges and a zero limit.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.keyword.trim().is_empty() {
            return Err(AppError::ConfigError("search keyword is empty".to_string()));
        }
        if self.min_date > self.max_date {
            return Err(AppError::ConfigError(format!(
                "minDate {} is after maxDate {}",
                format_api_date(&self.min_date),
                format_api_date(&self.max_date)
            )));
        }
        if self.limit == 0 {
            return Err(AppError::ConfigError("limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Query parameters in the order the search API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.keyword.clone()),
            ("minDate", format_api_date(&self.min_date)),
            ("maxDate", format_api_date(&self.max_date)),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_api_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// HTTP client configuration for the search API.
///
/// No timeout is set by default; the transport default applies.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Silo/0.1 (open-data-loader)".to_string(),
            timeout: None,
        }
    }
}

/// How staged records are reconciled with the destination schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Project records onto the fixed eleven-column schema and load with it.
    #[default]
    Fixed,
    /// Only stringify sequences and let the load job infer column types.
    AutoDetect,
}

/// Tunables for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scratch_dir: PathBuf,
    pub schema_policy: SchemaPolicy,
    /// How long to wait for an uploaded object to become visible.
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("temp"),
            schema_policy: SchemaPolicy::Fixed,
            visibility_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RawSettings {
        RawSettings {
            credentials_path: Some("/keys/sa.json".to_string()),
            bucket: Some("my_agro_bucket".to_string()),
            project_id: Some("agro".to_string()),
            dataset_id: Some("trade".to_string()),
            table_id: None,
        }
    }

    #[test]
    fn test_into_settings_complete() {
        let settings = complete().into_settings(Requirement::FullRun).unwrap();
        assert_eq!(settings.project_id, "agro");
        assert_eq!(settings.bucket().unwrap(), "my_agro_bucket");
        assert!(settings.table_id.is_none());
    }

    #[test]
    fn test_missing_reports_all_keys() {
        let raw = RawSettings {
            dataset_id: Some("trade".to_string()),
            ..Default::default()
        };
        assert_eq!(
            raw.missing(Requirement::FullRun),
            vec![CREDENTIALS_KEY, BUCKET_KEY, PROJECT_KEY]
        );

        let err = raw.into_settings(Requirement::FullRun).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains(BUCKET_KEY));
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let mut raw = complete();
        raw.project_id = Some("  ".to_string());
        raw.table_id = Some(String::new());
        assert_eq!(raw.missing(Requirement::FullRun), vec![PROJECT_KEY]);

        raw.project_id = Some("agro".to_string());
        let settings = raw.into_settings(Requirement::FullRun).unwrap();
        assert!(settings.table_id.is_none());
    }

    #[test]
    fn test_provision_does_not_need_bucket() {
        let mut raw = complete();
        raw.bucket = None;
        let settings = raw.into_settings(Requirement::Provision).unwrap();
        assert!(settings.bucket().is_err());
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::default();
        assert_eq!(
            query.query_pairs(),
            vec![
                ("q", "grain trade".to_string()),
                ("minDate", "2022-01-01T00:00:00Z".to_string()),
                ("maxDate", "2024-12-31T23:59:59Z".to_string()),
                ("limit", "100".to_string()),
            ]
        );
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_search_query_inverted_range() {
        let query = SearchQuery {
            min_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_search_query_zero_limit() {
        let query = SearchQuery {
            limit: 0,
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.scratch_dir, PathBuf::from("temp"));
        assert_eq!(config.schema_policy, SchemaPolicy::Fixed);
        assert_eq!(config.visibility_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_http_config_has_no_timeout() {
        assert!(HttpConfig::default().timeout.is_none());
    }
}
