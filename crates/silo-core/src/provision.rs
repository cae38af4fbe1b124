//! Destination table provisioning.
//!
//! A table is created at most once. When no table id is configured, one is
//! generated from the clock and written to the config store, so the next run
//! finds it there and appends to the same table.

use crate::backend::Warehouse;
use crate::config::{Settings, TABLE_KEY};
use crate::error::AppError;
use crate::models::{record_schema, TableRef};
use crate::store::ConfigStore;
use chrono::{DateTime, Local};
use tracing::info;

/// Generated table id for a provisioning run at `now`: `table_YYYYMMDD_HHMMSS`.
pub fn generate_table_id(now: &DateTime<Local>) -> String {
    format!("table_{}", now.format("%Y%m%d_%H%M%S"))
}

/// What the provisioner had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Table found; nothing created. A generated id is still persisted.
    AlreadyExists,
    /// Configured table was missing and has been created.
    Created,
    /// No table id was configured; one was generated, created and persisted.
    Generated,
}

/// Destination table and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub table: TableRef,
    pub outcome: ProvisionOutcome,
}

fn provisioning_error(err: AppError) -> AppError {
    match err {
        AppError::ProvisioningError(_) => err,
        other => AppError::ProvisioningError(other.to_string()),
    }
}

/// Makes sure the destination table exists with the fixed schema.
///
/// The table id is taken from `settings`, then from `store`; if neither has
/// one a new id is generated from `now`.
///
/// # Errors
///
/// Any failure other than "table not found" is returned as
/// `AppError::ProvisioningError` and must abort the run before fetching.
pub async fn ensure_table<W, S>(
    warehouse: &W,
    store: &mut S,
    settings: &Settings,
    now: &DateTime<Local>,
) -> Result<Provisioned, AppError>
where
    W: Warehouse + ?Sized,
    S: ConfigStore + ?Sized,
{
    let configured = match &settings.table_id {
        Some(id) => Some(id.clone()),
        None => store.get(TABLE_KEY).map_err(provisioning_error)?,
    };
    let generated = configured.is_none();
    let table_id = configured.unwrap_or_else(|| generate_table_id(now));
    let table = TableRef::new(&settings.project_id, &settings.dataset_id, &table_id);

    let exists = warehouse
        .table_exists(&table)
        .await
        .map_err(provisioning_error)?;

    if exists {
        info!("Table {} already exists.", table);
    } else {
        warehouse
            .create_table(&table, &record_schema())
            .await
            .map_err(provisioning_error)?;
        info!("Table {} created.", table);
    }

    if generated {
        store
            .set(TABLE_KEY, &table.table_id)
            .map_err(provisioning_error)?;
        info!("Table identifier {} added to the config store.", table.table_id);
    }

    let outcome = match (exists, generated) {
        (true, _) => ProvisionOutcome::AlreadyExists,
        (false, false) => ProvisionOutcome::Created,
        (false, true) => ProvisionOutcome::Generated,
    };
    Ok(Provisioned { table, outcome })
}
