//! # Persistent Stores
//!
//! Record stores for encrypted content and issued licenses. The core only
//! depends on the traits; [`MemoryStore`] backs tests and single-process
//! deployments.
//!
//! Stores offer no optimistic concurrency: two updates of the same record
//! race and the last write wins.

mod memory;

pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::license::License;

/// License status recorded once the companion status server acknowledged it
pub const STATUS_CREATED: u16 = 201;

/// An encrypted publication known to the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    /// Master key the publication resources are encrypted with
    pub encryption_key: Vec<u8>,
    /// Storage key of the encrypted archive
    pub location: String,
    pub length: u64,
    /// Hex SHA-256 of the encrypted archive
    pub sha256: String,
    /// Suggested file name for downloads
    pub name: String,
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Content")
            .field("id", &self.id)
            .field("encryption_key", &"<redacted>")
            .field("location", &self.location)
            .field("length", &self.length)
            .field("sha256", &self.sha256)
            .field("name", &self.name)
            .finish()
    }
}

pub trait ContentStore: Send + Sync {
    /// `NotFound` when no content has this id.
    fn get(&self, id: &str) -> Result<Content>;

    /// Insert or replace by id.
    fn add(&self, content: Content) -> Result<()>;

    fn list(&self) -> Result<Vec<Content>>;
}

pub trait LicenseStore: Send + Sync {
    /// `NotFound` when no license has this id.
    fn get(&self, id: &str) -> Result<License>;

    fn add(&self, license: License) -> Result<()>;

    /// Overwrite an existing license. `NotFound` when there is none.
    fn update(&self, license: License) -> Result<()>;

    /// Record the status acknowledged by the status server.
    fn update_status(&self, id: &str, status: u16) -> Result<()>;

    fn status(&self, id: &str) -> Result<Option<u16>>;

    fn list_for_content(&self, content_id: &str) -> Result<Vec<License>>;
}
