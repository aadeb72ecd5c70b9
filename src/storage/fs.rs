use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{check_key, join_url, Storage};
use crate::error::{LcpError, Result};

/// Objects stored as files in one directory.
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    /// Create the directory if needed.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            LcpError::StorageError(format!("cannot create {}: {e}", root.display()))
        })?;
        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl Storage for FileSystemStorage {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path(key)?;
        fs::read(&path).map_err(|e| LcpError::StorageError(format!("{key}: {e}")))
    }

    fn put(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        let path = self.path(key)?;
        let storage_err = |e: io::Error| LcpError::StorageError(format!("{key}: {e}"));

        // removed on drop unless persisted
        let mut spool = NamedTempFile::new_in(&self.root).map_err(storage_err)?;
        let written = io::copy(reader, spool.as_file_mut()).map_err(storage_err)?;
        spool.as_file().sync_all().map_err(storage_err)?;
        spool.persist(&path).map_err(|e| storage_err(e.error))?;

        debug!(key, bytes = written, "Object stored");
        Ok(written)
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}
