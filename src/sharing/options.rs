//! Durable key-value option storage.
//!
//! Options are JSON documents addressed by name. The sharing store keeps a
//! single option; everything else about persistence lives behind the
//! [`OptionStore`] trait.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::SharingResult;

/// Pluggable storage backend for named options.
pub trait OptionStore: Send + Sync {
    /// Read an option, `None` if it was never written.
    fn get(&self, name: &str) -> SharingResult<Option<Value>>;

    /// Write an option, replacing the previous value.
    fn set(&self, name: &str, value: Value) -> SharingResult<()>;

    /// Remove an option; no-op if absent.
    fn delete(&self, name: &str) -> SharingResult<()>;
}

/// Options held in process memory.
#[derive(Debug, Default)]
pub struct MemoryOptions {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptions {
    fn get(&self, name: &str) -> SharingResult<Option<Value>> {
        Ok(self.values.read().get(name).cloned())
    }

    fn set(&self, name: &str, value: Value) -> SharingResult<()> {
        self.values.write().insert(name.to_string(), value);
        Ok(())
    }

    fn delete(&self, name: &str) -> SharingResult<()> {
        self.values.write().remove(name);
        Ok(())
    }
}

/// Options persisted as one JSON object on disk.
///
/// The file is read once on open and rewritten on every change.
#[derive(Debug)]
pub struct JsonFileOptions {
    path: PathBuf,
    values: RwLock<HashMap<String, Value>>,
}

impl JsonFileOptions {
    /// Open the option file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> SharingResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut values = HashMap::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            values = serde_json::from_reader(reader)?;
            tracing::info!(path = ?path, options = values.len(), "Loaded options from file");
        }

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, Value>) -> SharingResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, values)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = ?self.path, options = values.len(), "Saved options to file");
        Ok(())
    }
}

impl OptionStore for JsonFileOptions {
    fn get(&self, name: &str) -> SharingResult<Option<Value>> {
        Ok(self.values.read().get(name).cloned())
    }

    fn set(&self, name: &str, value: Value) -> SharingResult<()> {
        let mut values = self.values.write();
        let previous = values.insert(name.to_string(), value);
        if let Err(e) = self.persist(&values) {
            // Keep memory and disk consistent.
            match previous {
                Some(previous) => values.insert(name.to_string(), previous),
                None => values.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> SharingResult<()> {
        let mut values = self.values.write();
        if let Some(previous) = values.remove(name) {
            if let Err(e) = self.persist(&values) {
                values.insert(name.to_string(), previous);
                return Err(e);
            }
        }
        Ok(())
    }
}
