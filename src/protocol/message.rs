//! Payloads exchanged on the command protocol.
//!
//! Every payload carries a `version` so either side can tell which layout a
//! peer speaks. Missing versions decode as 1 and unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::error::LcpError;
use crate::license::License;

/// Current payload layout version
pub const SCHEMA_VERSION: u16 = 1;

fn schema_version() -> u16 {
    SCHEMA_VERSION
}

/// Credentials plus a license. `UPDATELICENSE` and `UPDATELICENSESTATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAndLicense {
    #[serde(default = "schema_version")]
    pub version: u16,
    pub user: String,
    pub password: String,
    pub license: License,
}

impl AuthAndLicense {
    pub fn new(user: impl Into<String>, password: impl Into<String>, license: License) -> Self {
        Self {
            version: SCHEMA_VERSION,
            user: user.into(),
            password: password.into(),
            license,
        }
    }
}

/// An encrypted publication pushed by the encryption tool.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub content_id: String,
    /// Master key the publication was encrypted with
    pub content_key: Vec<u8>,
    /// Suggested download file name
    #[serde(default)]
    pub name: String,
    /// Archive bytes, when sent inline
    #[serde(default)]
    pub data: Vec<u8>,
    /// Path of the archive on a shared filesystem, when not sent inline
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Hex SHA-256 of the archive
    #[serde(default)]
    pub sha256: Option<String>,
}

impl std::fmt::Debug for ContentPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentPayload")
            .field("content_id", &self.content_id)
            .field("content_key", &"<redacted>")
            .field("name", &self.name)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .field("path", &self.path)
            .field("size", &self.size)
            .field("sha256", &self.sha256)
            .finish()
    }
}

/// Credentials plus a publication. `CREATECONTENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAndContentPayload {
    #[serde(default = "schema_version")]
    pub version: u16,
    pub user: String,
    pub password: String,
    pub content: ContentPayload,
}

impl AuthAndContentPayload {
    pub fn new(user: impl Into<String>, password: impl Into<String>, content: ContentPayload) -> Self {
        Self {
            version: SCHEMA_VERSION,
            user: user.into(),
            password: password.into(),
            content,
        }
    }
}

/// The one reply of every exchange. An empty message means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    #[serde(default = "schema_version")]
    pub version: u16,
    #[serde(default)]
    pub message: String,
}

impl ReplyError {
    pub fn ok() -> Self {
        Self {
            version: SCHEMA_VERSION,
            message: String::new(),
        }
    }

    pub fn from_error(err: &LcpError) -> Self {
        Self {
            version: SCHEMA_VERSION,
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.message.is_empty()
    }
}
