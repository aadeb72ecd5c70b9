use std::collections::HashMap;
use std::io::Read;
use std::sync::RwLock;

use super::{check_key, join_url, Storage};
use crate::error::{LcpError, Result};

/// Objects kept in process memory.
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            base_url: base_url.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| LcpError::StorageError("storage lock poisoned".into()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| LcpError::StorageError(format!("{key}: no such object")))
    }

    fn put(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        check_key(key)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let written = data.len() as u64;

        self.objects
            .write()
            .map_err(|_| LcpError::StorageError("storage lock poisoned".into()))?
            .insert(key.to_string(), data);
        Ok(written)
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}
