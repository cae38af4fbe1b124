//! Fetch-stage-load pipeline.
//!
//! One run is strictly sequential: search, normalize, stage to a scratch
//! file, upload, wait for the object to become visible, load with append
//! semantics, delete the scratch file. Provisioning happens before a run (see
//! [`crate::provision`]).

use crate::backend::{ObjectStore, SearchSource, Warehouse};
use crate::config::{PipelineConfig, SchemaPolicy, SearchQuery};
use crate::error::AppError;
use crate::models::{
    record_schema, LoadReport, LoadRequest, LoadSchema, ObjectUri, RawRecord, TableRef,
    WriteDisposition,
};
use crate::normalize::normalize;
use crate::staging::ScratchFile;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Terminal state of a run that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Rows were appended to the destination table.
    Loaded,
    /// The search returned no records; nothing was staged or uploaded.
    Empty,
    /// The search API answered with a non-success status.
    FetchRejected { status: u16, body: String },
    /// The load job failed; the uploaded object is left in place.
    LoadFailed { reason: String },
}

/// Statistics for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub table: TableRef,
    pub fetched: usize,
    pub staged: usize,
    pub object: Option<ObjectUri>,
    pub job_id: Option<String>,
    pub loaded_rows: Option<u64>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn new(table: &TableRef, outcome: RunOutcome) -> Self {
        Self {
            table: table.clone(),
            fetched: 0,
            staged: 0,
            object: None,
            job_id: None,
            loaded_rows: None,
            outcome,
        }
    }

    /// Returns true if the batch reached the destination table.
    pub fn is_loaded(&self) -> bool {
        self.outcome == RunOutcome::Loaded
    }
}

/// Polls `exists(name)` until it reports true or `timeout` elapses.
///
/// A timeout too large to represent as an instant means no deadline.
///
/// # Errors
///
/// Returns `AppError::ObjectNotVisible` on timeout, or the store's error.
pub async fn wait_until_visible(
    objects: &dyn ObjectStore,
    name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), AppError> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if objects.exists(name).await? {
            return Ok(());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AppError::ObjectNotVisible(
                name.to_string(),
                timeout.as_secs(),
            ));
        }
        sleep(interval).await;
    }
}

/// A configured pipeline over borrowed client handles.
pub struct Pipeline<'a> {
    source: &'a dyn SearchSource,
    objects: &'a dyn ObjectStore,
    warehouse: &'a dyn Warehouse,
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn SearchSource,
        objects: &'a dyn ObjectStore,
        warehouse: &'a dyn Warehouse,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            source,
            objects,
            warehouse,
            config,
        }
    }

    /// Runs the pipeline once, naming the batch file after the current time.
    pub async fn run(
        &self,
        query: &SearchQuery,
        table: &TableRef,
    ) -> Result<RunSummary, AppError> {
        self.run_at(query, table, &Local::now()).await
    }

    /// Runs the pipeline once with an explicit start time.
    ///
    /// # Errors
    ///
    /// Staging and upload failures are returned as errors. A non-success
    /// search status and load-job failures are not errors: they end the run
    /// with [`RunOutcome::FetchRejected`] or [`RunOutcome::LoadFailed`].
    /// In every case the scratch file is gone when this returns.
    pub async fn run_at(
        &self,
        query: &SearchQuery,
        table: &TableRef,
        now: &DateTime<Local>,
    ) -> Result<RunSummary, AppError> {
        info!("Searching for '{}' into {}", query.keyword, table);

        let records = match self.source.search(query).await {
            Ok(records) => records,
            Err(AppError::UnexpectedStatus { status, body }) => {
                warn!("Failed to retrieve data from the API: {} {}", status, body);
                return Ok(RunSummary::new(
                    table,
                    RunOutcome::FetchRejected { status, body },
                ));
            }
            Err(e) => return Err(e),
        };

        let fetched = records.len();
        info!("Fetched {} records", fetched);
        if records.is_empty() {
            return Ok(RunSummary::new(table, RunOutcome::Empty));
        }

        let policy = self.config.schema_policy;
        let normalized: Vec<RawRecord> = records
            .into_iter()
            .map(|record| normalize(record, policy))
            .collect();

        let mut scratch = ScratchFile::create(&self.config.scratch_dir, now)?;
        let result = self.stage_and_load(&scratch, &normalized, table).await;
        if let Err(e) = scratch.remove() {
            warn!("Failed to delete temporary file {}: {}", scratch.name(), e);
        }

        let mut summary = result?;
        summary.fetched = fetched;
        Ok(summary)
    }

    async fn stage_and_load(
        &self,
        scratch: &ScratchFile,
        records: &[RawRecord],
        table: &TableRef,
    ) -> Result<RunSummary, AppError> {
        let staged = scratch.write_records(records)?;

        let object = self.objects.put_file(scratch.path(), scratch.name()).await?;
        info!("File {} has been uploaded to {}.", scratch.name(), object);

        wait_until_visible(
            self.objects,
            &object.name,
            self.config.visibility_timeout,
            self.config.poll_interval,
        )
        .await?;

        let request = LoadRequest {
            source: object.clone(),
            destination: table.clone(),
            schema: match self.config.schema_policy {
                SchemaPolicy::Fixed => LoadSchema::Explicit(record_schema()),
                SchemaPolicy::AutoDetect => LoadSchema::AutoDetect,
            },
            write_disposition: WriteDisposition::Append,
        };

        let mut summary = RunSummary::new(table, RunOutcome::Loaded);
        summary.staged = staged;
        summary.object = Some(object);

        match self.warehouse.load(&request).await {
            Ok(LoadReport {
                job_id,
                output_rows,
            }) => {
                info!(
                    "File {} has been successfully loaded into table {} (job {}).",
                    scratch.name(),
                    table,
                    job_id
                );
                summary.job_id = Some(job_id);
                summary.loaded_rows = output_rows;
            }
            Err(e) => {
                error!("Failed to load the file into {}: {}", table, e);
                summary.outcome = RunOutcome::LoadFailed {
                    reason: e.to_string(),
                };
            }
        }

        Ok(summary)
    }
}
