use serde::{Deserialize, Serialize};
use std::fmt;

/// One search-result item, exactly as the API returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Column names of the destination table, in schema order.
pub const RECORD_COLUMNS: [&str; 11] = [
    "identifier",
    "country",
    "creator",
    "keywords",
    "resource",
    "catalog",
    "description",
    "landing_page",
    "version_info",
    "title",
    "distributions",
];

/// Column types the destination schema uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
}

/// A single column of the destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn nullable_string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::String,
            nullable: true,
        }
    }
}

/// The fixed destination schema: eleven nullable string columns.
pub fn record_schema() -> Vec<Column> {
    RECORD_COLUMNS
        .iter()
        .map(|name| Column::nullable_string(name))
        .collect()
}

/// Fully qualified destination table, displayed as `project.dataset.table`.
///
/// # Examples
///
/// ```
/// use silo_core::TableRef;
///
/// let table = TableRef::new("agro", "trade", "table_20240101_120000");
/// assert_eq!(table.to_string(), "agro.trade.table_20240101_120000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(project_id: &str, dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Location of an uploaded object, displayed as `gs://bucket/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUri {
    pub bucket: String,
    pub name: String,
}

impl ObjectUri {
    pub fn new(bucket: &str, name: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

/// How the load job learns column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSchema {
    AutoDetect,
    Explicit(Vec<Column>),
}

/// Load job write policy. Only append is used; it is the one policy that
/// keeps repeated runs against one table from clobbering each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    #[default]
    Append,
}

/// Everything the warehouse needs to import one batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub source: ObjectUri,
    pub destination: TableRef,
    pub schema: LoadSchema,
    pub write_disposition: WriteDisposition,
}

/// Result of a completed load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub job_id: String,
    /// Rows written, when the warehouse reports it.
    pub output_rows: Option<u64>,
}
