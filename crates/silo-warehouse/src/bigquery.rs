use async_trait::async_trait;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::job::Job;
use gcp_bigquery_client::model::job_configuration::JobConfiguration;
use gcp_bigquery_client::model::job_configuration_load::JobConfigurationLoad;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::table::Table;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_reference::TableReference;
use gcp_bigquery_client::model::table_schema::TableSchema;
use gcp_bigquery_client::Client;
use silo_core::error::AppError;
use silo_core::models::{Column, LoadReport, LoadRequest, LoadSchema, TableRef, WriteDisposition};
use silo_core::Warehouse;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

/// Delay between load-job status checks.
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);

const NEWLINE_DELIMITED_JSON: &str = "NEWLINE_DELIMITED_JSON";

/// BigQuery-backed [`Warehouse`].
///
/// # Examples
///
/// ```no_run
/// use silo_warehouse::BigQueryWarehouse;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let warehouse = BigQueryWarehouse::connect(Path::new("/keys/sa.json"), "agro").await?;
/// # Ok(())
/// # }
/// ```
pub struct BigQueryWarehouse {
    client: Client,
    project_id: String,
}

impl BigQueryWarehouse {
    /// Builds a client from a service-account key file. Jobs run in
    /// `project_id`.
    pub async fn connect(credentials_path: &Path, project_id: &str) -> Result<Self, AppError> {
        let path = credentials_path.to_string_lossy();
        let client = Client::from_service_account_key_file(&path)
            .await
            .map_err(|e| {
                AppError::ProvisioningError(format!("BigQuery authentication failed: {}", e))
            })?;

        Ok(Self {
            client,
            project_id: project_id.to_string(),
        })
    }

    async fn wait_for_job(&self, job_id: &str, location: Option<&str>) -> Result<Job, AppError> {
        loop {
            let job = self
                .client
                .job()
                .get_job(&self.project_id, job_id, location)
                .await
                .map_err(|e| AppError::LoadJobError(format!("polling job {}: {}", job_id, e)))?;

            if is_done(&job) {
                return Ok(job);
            }
            debug!("Load job {} still running", job_id);
            sleep(JOB_POLL_INTERVAL).await;
        }
    }
}

/// True if the error is a 404 answer from the BigQuery API.
pub fn is_not_found(err: &BQError) -> bool {
    matches!(err, BQError::ResponseError { error } if error.error.code == 404)
}

pub fn field_schema(column: &Column) -> TableFieldSchema {
    let mut field = TableFieldSchema::string(&column.name);
    field.mode = Some(if column.nullable { "NULLABLE" } else { "REQUIRED" }.to_string());
    field
}

pub fn table_schema(columns: &[Column]) -> TableSchema {
    TableSchema::new(columns.iter().map(field_schema).collect())
}

fn table_reference(table: &TableRef) -> TableReference {
    TableReference::new(&table.project_id, &table.dataset_id, &table.table_id)
}

fn write_disposition(disposition: WriteDisposition) -> &'static str {
    match disposition {
        WriteDisposition::Append => "WRITE_APPEND",
    }
}

/// Load configuration for one batch file.
pub fn load_configuration(request: &LoadRequest) -> JobConfigurationLoad {
    let (autodetect, schema) = match &request.schema {
        LoadSchema::AutoDetect => (true, None),
        LoadSchema::Explicit(columns) => (false, Some(table_schema(columns))),
    };

    JobConfigurationLoad {
        source_uris: Some(vec![request.source.to_string()]),
        destination_table: Some(table_reference(&request.destination)),
        source_format: Some(NEWLINE_DELIMITED_JSON.to_string()),
        autodetect: Some(autodetect),
        ignore_unknown_values: Some(!autodetect),
        schema,
        write_disposition: Some(write_disposition(request.write_disposition).to_string()),
        ..Default::default()
    }
}

/// Load job with a caller-chosen id, so it can be polled right after insert.
pub fn load_job(project_id: &str, job_id: &str, request: &LoadRequest) -> Job {
    Job {
        job_reference: Some(JobReference {
            project_id: Some(project_id.to_string()),
            job_id: Some(job_id.to_string()),
            ..Default::default()
        }),
        configuration: Some(JobConfiguration {
            load: Some(load_configuration(request)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn is_done(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.state.as_deref())
        .map_or(false, |state| state == "DONE")
}

/// Rows written by a finished load job, as reported in its statistics.
pub fn output_rows(job: &Job) -> Option<u64> {
    job.statistics
        .as_ref()?
        .load
        .as_ref()?
        .output_rows
        .as_deref()?
        .parse()
        .ok()
}

/// Error message of a finished job, if it failed.
pub fn job_error(job: &Job) -> Option<String> {
    let status = job.status.as_ref()?;
    let error = status.error_result.as_ref()?;
    Some(
        error
            .message
            .clone()
            .or_else(|| error.reason.clone())
            .unwrap_or_else(|| "load job failed".to_string()),
    )
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn table_exists(&self, table: &TableRef) -> Result<bool, AppError> {
        match self
            .client
            .table()
            .get(&table.project_id, &table.dataset_id, &table.table_id, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(AppError::ProvisioningError(format!(
                "fetching metadata of {}: {}",
                table, e
            ))),
        }
    }

    async fn create_table(&self, table: &TableRef, schema: &[Column]) -> Result<(), AppError> {
        let definition = Table::new(
            &table.project_id,
            &table.dataset_id,
            &table.table_id,
            table_schema(schema),
        );

        self.client
            .table()
            .create(definition)
            .await
            .map_err(|e| AppError::ProvisioningError(format!("creating {}: {}", table, e)))?;
        Ok(())
    }

    async fn load(&self, request: &LoadRequest) -> Result<LoadReport, AppError> {
        let job_id = format!("silo_load_{}", Uuid::new_v4().simple());
        let job = load_job(&self.project_id, &job_id, request);

        let inserted = self
            .client
            .job()
            .insert(&self.project_id, job)
            .await
            .map_err(|e| AppError::LoadJobError(format!("submitting load job: {}", e)))?;
        info!("Submitted load job {} for {}", job_id, request.source);

        let location = inserted
            .job_reference
            .as_ref()
            .and_then(|r| r.location.clone());
        let finished = if is_done(&inserted) {
            inserted
        } else {
            self.wait_for_job(&job_id, location.as_deref()).await?
        };

        if let Some(message) = job_error(&finished) {
            return Err(AppError::LoadJobError(message));
        }

        Ok(LoadReport {
            output_rows: output_rows(&finished),
            job_id,
        })
    }
}
