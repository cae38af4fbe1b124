//! Persistent key/value configuration store.
//!
//! Settings come from a flat `.env` file. The provisioner writes generated
//! table ids back so later runs reuse them.

use crate::error::AppError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Flat mapping of named string settings.
pub trait ConfigStore {
    /// Returns the value of `key`, or `None` when absent or empty.
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Updates `key` if present, appends it otherwise.
    fn set(&mut self, key: &str, value: &str) -> Result<(), AppError>;
}

/// `ConfigStore` backed by a dotenv-style file of `KEY=value` lines.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<String>, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Key assigned by a `KEY=value` line, optionally prefixed by `export`.
/// Comments and blank lines yield `None`.
fn assigned_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    Some(key.trim())
}

fn env_file_error(path: &Path, err: dotenvy::Error) -> AppError {
    AppError::ConfigError(format!("Failed to read {}: {}", path.display(), err))
}

impl ConfigStore for EnvFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let entries = match dotenvy::from_path_iter(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.not_found() => return Ok(None),
            Err(e) => return Err(env_file_error(&self.path, e)),
        };

        // Last assignment wins, as in dotenv files that were appended to.
        let mut value = None;
        for entry in entries {
            let (k, v) = entry.map_err(|e| env_file_error(&self.path, e))?;
            if k == key {
                value = Some(v);
            }
        }
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        let entry = format!("{}=\"{}\"", key, value);
        let mut lines = self.read_lines()?;
        let mut replaced = false;

        for line in lines.iter_mut() {
            if assigned_key(line) == Some(key) {
                *line = entry.clone();
                replaced = true;
            }
        }
        if !replaced {
            lines.push(entry);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&self.path, content)?;
        Ok(())
    }
}
