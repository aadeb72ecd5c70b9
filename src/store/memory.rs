use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Content, ContentStore, LicenseStore};
use crate::error::{constants, LcpError, Result};
use crate::license::License;

const ERR_POISONED: &str = "store lock poisoned";

#[derive(Default)]
struct LicenseRecord {
    license: License,
    status: Option<u16>,
}

/// In-process store implementing both record stores.
#[derive(Default)]
pub struct MemoryStore {
    contents: RwLock<HashMap<String, Content>>,
    licenses: RwLock<HashMap<String, LicenseRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Content>>> {
        self.contents
            .read()
            .map_err(|_| LcpError::StorageError(ERR_POISONED.into()))
    }

    fn contents_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Content>>> {
        self.contents
            .write()
            .map_err(|_| LcpError::StorageError(ERR_POISONED.into()))
    }

    fn licenses(&self) -> Result<RwLockReadGuard<'_, HashMap<String, LicenseRecord>>> {
        self.licenses
            .read()
            .map_err(|_| LcpError::StorageError(ERR_POISONED.into()))
    }

    fn licenses_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, LicenseRecord>>> {
        self.licenses
            .write()
            .map_err(|_| LcpError::StorageError(ERR_POISONED.into()))
    }
}

fn not_found() -> LcpError {
    LcpError::NotFound(constants::ERR_RECORD_NOT_FOUND.into())
}

impl ContentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Content> {
        self.contents()?.get(id).cloned().ok_or_else(not_found)
    }

    fn add(&self, content: Content) -> Result<()> {
        self.contents_mut()?.insert(content.id.clone(), content);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Content>> {
        let mut contents: Vec<Content> = self.contents()?.values().cloned().collect();
        contents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(contents)
    }
}

impl LicenseStore for MemoryStore {
    fn get(&self, id: &str) -> Result<License> {
        self.licenses()?
            .get(id)
            .map(|record| record.license.clone())
            .ok_or_else(not_found)
    }

    fn add(&self, license: License) -> Result<()> {
        self.licenses_mut()?.insert(
            license.id.clone(),
            LicenseRecord {
                license,
                status: None,
            },
        );
        Ok(())
    }

    fn update(&self, license: License) -> Result<()> {
        let mut licenses = self.licenses_mut()?;
        let record = licenses.get_mut(&license.id).ok_or_else(not_found)?;
        record.license = license;
        Ok(())
    }

    fn update_status(&self, id: &str, status: u16) -> Result<()> {
        let mut licenses = self.licenses_mut()?;
        let record = licenses.get_mut(id).ok_or_else(not_found)?;
        record.status = Some(status);
        Ok(())
    }

    fn status(&self, id: &str) -> Result<Option<u16>> {
        self.licenses()?
            .get(id)
            .map(|record| record.status)
            .ok_or_else(not_found)
    }

    fn list_for_content(&self, content_id: &str) -> Result<Vec<License>> {
        let mut licenses: Vec<License> = self
            .licenses()?
            .values()
            .filter(|record| record.license.content_id == content_id)
            .map(|record| record.license.clone())
            .collect();
        licenses.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(licenses)
    }
}
