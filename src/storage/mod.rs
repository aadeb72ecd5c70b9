//! # Object Storage
//!
//! Where encrypted publication archives live. Keys are flat names (usually
//! the content id); [`Storage::url`] gives the public location written into
//! license publication links.

mod fs;
mod memory;

pub use fs::FileSystemStorage;
pub use memory::MemoryStorage;

use std::io::Read;

use crate::error::{LcpError, Result};

pub trait Storage: Send + Sync {
    /// Full contents of the object. `StorageError` when it cannot be fetched.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store everything `reader` yields under `key`, replacing any previous
    /// object. Returns the number of bytes written.
    fn put(&self, key: &str, reader: &mut dyn Read) -> Result<u64>;

    /// Public URL of the object.
    fn url(&self, key: &str) -> String;
}

/// Reject keys that could escape a flat namespace.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(LcpError::StorageError(format!("invalid storage key: {key:?}")));
    }
    Ok(())
}

pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
