use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use silo_core::config::{CREDENTIALS_KEY, DEFAULT_SEARCH_ENDPOINT};
use silo_core::{PipelineConfig, RawSettings, SchemaPolicy, SearchQuery};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the dotenv file to load and write back to.
pub const ENV_FILE_VAR: &str = "SILO_ENV_FILE";

/// Path of the dotenv file: `$SILO_ENV_FILE`, or `.env` in the working directory.
pub fn env_file_path() -> PathBuf {
    std::env::var_os(ENV_FILE_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"))
}

/// CLI configuration parsed from command line arguments and environment variables.
///
/// Every flag has an environment fallback, so running `silo` without
/// arguments performs a full run driven by `.env`.
#[derive(Parser, Debug)]
#[command(name = "silo")]
#[command(
    author,
    version,
    about = "Fetch open-data search results and append them to a BigQuery table"
)]
#[command(after_help = "Examples:
  silo                                   # provision, fetch, stage, upload, load
  silo provision                         # only make sure the table exists
  silo fetch --output data/data.json     # only save the raw API response
  silo --query \"wheat export\" --limit 50")]
pub struct Config {
    /// Service-account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials: Option<String>,

    /// Cloud Storage bucket receiving batch files
    #[arg(long, env = "GCS_BUCKET_NAME")]
    pub bucket: Option<String>,

    /// Google Cloud project id
    #[arg(long, env = "GCP_PROJECT_ID")]
    pub project: Option<String>,

    /// BigQuery dataset id
    #[arg(long, env = "BIGQUERY_DATASET_ID")]
    pub dataset: Option<String>,

    /// BigQuery table id; generated and saved to the env file when unset
    #[arg(long, env = "BIGQUERY_TABLE_ID")]
    pub table: Option<String>,

    #[command(flatten)]
    pub search: SearchArgs,

    /// Directory for scratch batch files
    #[arg(long, env = "SILO_SCRATCH_DIR", default_value = "temp")]
    pub scratch_dir: PathBuf,

    /// How records are reconciled with the table schema
    #[arg(long, env = "SILO_SCHEMA_POLICY", value_enum, default_value = "fixed")]
    pub schema_policy: SchemaPolicyArg,

    /// Seconds to wait for an uploaded object to become visible
    #[arg(long, env = "SILO_VISIBILITY_TIMEOUT", default_value = "30")]
    pub visibility_timeout: u64,

    /// Milliseconds between visibility checks
    #[arg(long, env = "SILO_POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Search API parameters
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search endpoint URL
    #[arg(long, env = "SILO_SEARCH_ENDPOINT", default_value = DEFAULT_SEARCH_ENDPOINT)]
    pub endpoint: String,

    /// Keyword query
    #[arg(long, env = "SILO_QUERY", default_value = "grain trade")]
    pub query: String,

    /// Inclusive lower bound (ISO-8601 UTC)
    #[arg(long, env = "SILO_MIN_DATE", default_value = "2022-01-01T00:00:00Z")]
    pub min_date: DateTime<Utc>,

    /// Inclusive upper bound (ISO-8601 UTC)
    #[arg(long, env = "SILO_MAX_DATE", default_value = "2024-12-31T23:59:59Z")]
    pub max_date: DateTime<Utc>,

    /// Maximum number of results
    #[arg(long, env = "SILO_LIMIT", default_value = "100")]
    pub limit: u32,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Provision the table, then fetch, stage, upload and load (default)
    Run,
    /// Ensure the destination table exists, creating it if needed
    Provision,
    /// Fetch one page of results and save the raw response body
    #[command(after_help = "Example: silo fetch --output data/data.json")]
    Fetch {
        /// Where to write the pretty-printed response
        #[arg(short, long, default_value = "data/data.json")]
        output: PathBuf,
    },
}

/// Schema reconciliation policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaPolicyArg {
    /// Project records onto the fixed eleven-column schema
    Fixed,
    /// Let the load job infer column types
    Autodetect,
}

impl From<SchemaPolicyArg> for SchemaPolicy {
    fn from(arg: SchemaPolicyArg) -> Self {
        match arg {
            SchemaPolicyArg::Fixed => SchemaPolicy::Fixed,
            SchemaPolicyArg::Autodetect => SchemaPolicy::AutoDetect,
        }
    }
}

impl Config {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Environment assignment that makes the chosen key file visible to
    /// clients that only read credentials from the environment.
    pub fn credentials_export(&self) -> Option<(&'static str, &str)> {
        self.credentials
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| (CREDENTIALS_KEY, path))
    }

    pub fn raw_settings(&self) -> RawSettings {
        RawSettings {
            credentials_path: self.credentials.clone(),
            bucket: self.bucket.clone(),
            project_id: self.project.clone(),
            dataset_id: self.dataset.clone(),
            table_id: self.table.clone(),
        }
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            keyword: self.search.query.clone(),
            min_date: self.search.min_date,
            max_date: self.search.max_date,
            limit: self.search.limit,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scratch_dir: self.scratch_dir.clone(),
            schema_policy: self.schema_policy.into(),
            visibility_timeout: Duration::from_secs(self.visibility_timeout),
            poll_interval: Duration::from_millis(self.poll_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::Requirement;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_flags_override_settings() {
        let config = parse(&[
            "silo",
            "--credentials",
            "/keys/sa.json",
            "--bucket",
            "my_agro_bucket",
            "--project",
            "agro",
            "--dataset",
            "trade",
            "--table",
            "grain",
        ]);

        let settings = config
            .raw_settings()
            .into_settings(Requirement::FullRun)
            .unwrap();
        assert_eq!(settings.bucket().unwrap(), "my_agro_bucket");
        assert_eq!(settings.table_id.as_deref(), Some("grain"));
    }

    #[test]
    fn test_credentials_flag_is_exported() {
        let config = parse(&["silo", "--credentials", "/keys/sa.json"]);
        assert_eq!(
            config.credentials_export(),
            Some(("GOOGLE_APPLICATION_CREDENTIALS", "/keys/sa.json"))
        );

        let config = parse(&["silo", "--credentials", ""]);
        assert_eq!(config.credentials_export(), None);
    }

    #[test]
    fn test_command_defaults_to_run() {
        let config = parse(&["silo", "--query", "wheat"]);
        assert_eq!(config.command(), Command::Run);
        assert_eq!(config.search_query().keyword, "wheat");
    }

    #[test]
    fn test_fetch_subcommand_output() {
        let config = parse(&["silo", "fetch", "--output", "out/raw.json"]);
        assert_eq!(
            config.command(),
            Command::Fetch {
                output: PathBuf::from("out/raw.json")
            }
        );
    }

    #[test]
    fn test_search_dates_parse() {
        let config = parse(&[
            "silo",
            "--min-date",
            "2023-05-01T00:00:00Z",
            "--max-date",
            "2023-06-01T12:00:00Z",
            "--limit",
            "10",
        ]);
        let pairs = config.search_query().query_pairs();
        assert_eq!(pairs[1].1, "2023-05-01T00:00:00Z");
        assert_eq!(pairs[2].1, "2023-06-01T12:00:00Z");
        assert_eq!(pairs[3].1, "10");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        assert!(Config::try_parse_from(["silo", "--min-date", "yesterday"]).is_err());
    }

    #[test]
    fn test_schema_policy_flag() {
        let config = parse(&["silo", "--schema-policy", "autodetect", "provision"]);
        assert_eq!(
            config.pipeline_config().schema_policy,
            SchemaPolicy::AutoDetect
        );
        assert_eq!(config.command(), Command::Provision);
    }
}
