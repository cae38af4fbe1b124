//! In-memory backends for unit tests.

use crate::backend::{ObjectStore, SearchSource, Warehouse};
use crate::config::{SearchQuery, Settings};
use crate::error::AppError;
use crate::models::{Column, LoadReport, LoadRequest, ObjectUri, RawRecord, TableRef};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn settings(table_id: Option<&str>) -> Settings {
    Settings {
        credentials_path: PathBuf::from("/keys/sa.json"),
        project_id: "agro".to_string(),
        dataset_id: "trade".to_string(),
        bucket: Some("my_agro_bucket".to_string()),
        table_id: table_id.map(str::to_string),
    }
}

pub fn record(value: Value) -> RawRecord {
    value.as_object().cloned().unwrap_or_default()
}

/// Search source answering every query with the same canned response.
pub struct FakeSource {
    response: Result<Vec<RawRecord>, (u16, String)>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn ok(records: Vec<RawRecord>) -> Self {
        Self {
            response: Ok(records),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            response: Err((status, body.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchSource for FakeSource {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(records) => Ok(records.clone()),
            Err((status, body)) => Err(AppError::UnexpectedStatus {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// Object store keeping uploaded file contents in memory.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<String, String>>,
    /// Number of `exists` polls that report "not yet visible".
    hidden_polls: AtomicUsize,
    never_visible: Mutex<bool>,
    upload_error: Mutex<Option<String>>,
}

impl FakeObjectStore {
    pub const BUCKET: &'static str = "my_agro_bucket";

    pub fn hide_for(&self, polls: usize) {
        self.hidden_polls.store(polls, Ordering::SeqCst);
    }

    pub fn never_visible(&self) {
        *self.never_visible.lock().unwrap() = true;
    }

    pub fn fail_uploads(&self, message: &str) {
        *self.upload_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn object(&self, name: &str) -> Option<String> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put_file(&self, local: &Path, name: &str) -> Result<ObjectUri, AppError> {
        if let Some(message) = self.upload_error.lock().unwrap().clone() {
            return Err(AppError::StorageError(message));
        }
        let content = std::fs::read_to_string(local)?;
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), content);
        Ok(ObjectUri::new(Self::BUCKET, name))
    }

    async fn exists(&self, name: &str) -> Result<bool, AppError> {
        if *self.never_visible.lock().unwrap() {
            return Ok(false);
        }
        let hidden = self.hidden_polls.load(Ordering::SeqCst);
        if hidden > 0 {
            self.hidden_polls.store(hidden - 1, Ordering::SeqCst);
            return Ok(false);
        }
        Ok(self.objects.lock().unwrap().contains_key(name))
    }
}

#[derive(Default)]
struct FakeTable {
    schema: Vec<Column>,
    rows: Vec<Value>,
}

/// Warehouse whose load jobs read batch files from a [`FakeObjectStore`].
#[derive(Default)]
pub struct FakeWarehouse {
    objects: Option<Arc<FakeObjectStore>>,
    tables: Mutex<HashMap<TableRef, FakeTable>>,
    create_calls: AtomicUsize,
    loads: Mutex<Vec<LoadRequest>>,
    metadata_error: Mutex<Option<String>>,
    load_error: Mutex<Option<String>>,
}

impl FakeWarehouse {
    pub fn reading_from(objects: Arc<FakeObjectStore>) -> Self {
        Self {
            objects: Some(objects),
            ..Default::default()
        }
    }

    pub fn insert_table(&self, table: &TableRef) {
        self.tables.lock().unwrap().insert(
            table.clone(),
            FakeTable {
                schema: crate::models::record_schema(),
                rows: Vec::new(),
            },
        );
    }

    pub fn fail_metadata(&self, message: &str) {
        *self.metadata_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_loads(&self, message: &str) {
        *self.load_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Vec<LoadRequest> {
        self.loads.lock().unwrap().clone()
    }

    pub fn schema_of(&self, table: &TableRef) -> Option<Vec<Column>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.schema.clone())
    }

    pub fn rows_of(&self, table: &TableRef) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn table_exists(&self, table: &TableRef) -> Result<bool, AppError> {
        if let Some(message) = self.metadata_error.lock().unwrap().clone() {
            return Err(AppError::ProvisioningError(message));
        }
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn create_table(&self, table: &TableRef, schema: &[Column]) -> Result<(), AppError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap().insert(
            table.clone(),
            FakeTable {
                schema: schema.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load(&self, request: &LoadRequest) -> Result<LoadReport, AppError> {
        self.loads.lock().unwrap().push(request.clone());
        if let Some(message) = self.load_error.lock().unwrap().clone() {
            return Err(AppError::LoadJobError(message));
        }

        let content = self
            .objects
            .as_ref()
            .and_then(|store| store.object(&request.source.name))
            .ok_or_else(|| AppError::LoadJobError(format!("Not found: URI {}", request.source)))?;
        let rows = content
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::LoadJobError(e.to_string()))?;

        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(&request.destination)
            .ok_or_else(|| AppError::LoadJobError(format!("Not found: Table {}", request.destination)))?;
        let count = rows.len() as u64;
        table.rows.extend(rows);

        Ok(LoadReport {
            job_id: format!("job_{}", self.loads.lock().unwrap().len()),
            output_rows: Some(count),
        })
    }
}
