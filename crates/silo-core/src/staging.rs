//! Scratch batch files.
//!
//! A batch file is newline-delimited JSON under a timestamped name inside the
//! scratch directory. It belongs to the run that created it and is removed
//! when that run ends, including when the run fails after staging.

use crate::error::AppError;
use crate::models::RawRecord;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Batch file name for a run started at `now`: `data_YYYY-MM-DD_HH-MM-SS.json`.
pub fn batch_file_name(now: &DateTime<Local>) -> String {
    format!("data_{}.json", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// A locally staged batch file.
///
/// Dropping the value deletes the file if it still exists.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    name: String,
    removed: bool,
}

impl ScratchFile {
    /// Creates the scratch directory if needed and an empty batch file in it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::IoError` if the directory or file cannot be created.
    pub fn create(dir: &Path, now: &DateTime<Local>) -> Result<Self, AppError> {
        fs::create_dir_all(dir)?;
        let name = batch_file_name(now);
        let path = dir.join(&name);
        File::create(&path)?;
        debug!("Created scratch file {}", path.display());

        Ok(Self {
            path,
            name,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name, reused as the object name on upload.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes one JSON object per line, replacing any previous content.
    /// Returns the number of lines written.
    pub fn write_records(&self, records: &[RawRecord]) -> Result<usize, AppError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("File {} has been saved locally.", self.name);
        Ok(records.len())
    }

    /// Deletes the file. Deleting a file that is already gone is not an error.
    pub fn remove(&mut self) -> Result<(), AppError> {
        if self.removed {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Temporary file {} has been deleted.", self.name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.removed = true;
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("Failed to delete temporary file {}: {}", self.path.display(), e);
        }
    }
}
