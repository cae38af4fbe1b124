use anyhow::Context;
use chrono::Local;
use clap::Parser;
use std::path::Path;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use silo_cli::{env_file_path, Command, Config};
use silo_client::SearchClient;
use silo_core::{
    ensure_table, AppError, EnvFileStore, Pipeline, RunOutcome, RunSummary, Requirement,
};
use silo_warehouse::{BigQueryWarehouse, GcsStore};

fn main() -> anyhow::Result<()> {
    // Load environment variables from the env file; existing variables win
    dotenvy::from_path(env_file_path()).ok();

    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::parse();

    // The Cloud Storage client reads the key file location from the
    // environment, so the override is exported while still single-threaded.
    if let Some((key, path)) = config.credentials_export() {
        std::env::set_var(key, path);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(async {
        match config.command() {
            Command::Run => run(&config).await,
            Command::Provision => provision(&config).await,
            Command::Fetch { output } => fetch(&config, &output).await,
        }
    });

    if let Err(e) = &result {
        if let Some(app_err) = e.downcast_ref::<AppError>() {
            error!("{}", app_err.user_message());
        }
    }
    result
}

/// Provision, fetch, stage, upload, load, clean up.
async fn run(config: &Config) -> anyhow::Result<()> {
    let settings = config.raw_settings().into_settings(Requirement::FullRun)?;
    let query = config.search_query();
    query.validate()?;

    let warehouse = BigQueryWarehouse::connect(&settings.credentials_path, &settings.project_id)
        .await
        .context("Failed to create BigQuery client")?;
    let mut store = EnvFileStore::new(env_file_path());
    let provisioned = ensure_table(&warehouse, &mut store, &settings, &Local::now()).await?;

    let objects = GcsStore::connect(settings.bucket()?)
        .await
        .context("Failed to create Cloud Storage client")?;
    let source = SearchClient::new(&config.search.endpoint)?;
    let pipeline_config = config.pipeline_config();

    let pipeline = Pipeline::new(&source, &objects, &warehouse, &pipeline_config);
    let summary = pipeline.run(&query, &provisioned.table).await?;
    report(&summary);

    Ok(())
}

/// Only make sure the destination table exists.
async fn provision(config: &Config) -> anyhow::Result<()> {
    let settings = config.raw_settings().into_settings(Requirement::Provision)?;

    let warehouse = BigQueryWarehouse::connect(&settings.credentials_path, &settings.project_id)
        .await
        .context("Failed to create BigQuery client")?;
    let mut store = EnvFileStore::new(env_file_path());
    let provisioned = ensure_table(&warehouse, &mut store, &settings, &Local::now()).await?;

    info!(
        "Destination table {} ({:?})",
        provisioned.table, provisioned.outcome
    );
    Ok(())
}

/// Save the raw response body of one search request.
async fn fetch(config: &Config, output: &Path) -> anyhow::Result<()> {
    let query = config.search_query();
    query.validate()?;
    let client = SearchClient::new(&config.search.endpoint)?;

    let body = match client.fetch_raw(&query).await {
        Ok(body) => body,
        Err(AppError::UnexpectedStatus { status, body }) => {
            warn!("Request failed: {} {}", status, body);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&body)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Data saved to {}", output.display());
    Ok(())
}

fn report(summary: &RunSummary) {
    match &summary.outcome {
        RunOutcome::Loaded => info!(
            "Run complete: {} fetched, {} staged, {} rows loaded into {} (job {})",
            summary.fetched,
            summary.staged,
            summary
                .loaded_rows
                .map_or_else(|| "?".to_string(), |n| n.to_string()),
            summary.table,
            summary.job_id.as_deref().unwrap_or("-")
        ),
        RunOutcome::Empty => info!("Run complete: no records matched, nothing loaded"),
        RunOutcome::FetchRejected { status, .. } => {
            warn!("Run ended: search API returned HTTP {}", status)
        }
        RunOutcome::LoadFailed { reason } => warn!(
            "Run ended: {} records staged to {} but not loaded: {}",
            summary.staged,
            summary
                .object
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            reason
        ),
    }
}
