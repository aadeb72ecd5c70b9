//! # Error Types
//!
//! Error handling for license issuance, publication packaging and the
//! server-to-server command protocol.
//!
//! ## Error Categories
//! - **Lookup Errors**: missing content or license records
//! - **Container Errors**: unreadable archives, malformed descriptors
//! - **Cryptographic Errors**: encryption and signing failures
//! - **Protocol Errors**: bad credentials, unknown commands, missing or corrupt payloads
//! - **Storage Errors**: object storage fetch/put failures
//!
//! None of these are retried inside the crate: every failure surfaces to the
//! caller, which decides how to translate it (HTTP status, protocol reply, log line).
//!
//! ## Example Usage
//! ```rust
//! use lcp_core::error::{ErrorKind, LcpError, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     Err(LcpError::NotFound(format!("content {id}")))
//! }
//!
//! let err = lookup("abc").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Protocol errors
    pub const ERR_MISSING_PAYLOAD: &str = "Missing mandatory payload";
    pub const ERR_TRUNCATED_PAYLOAD: &str = "Payload ended before a complete value was read";
    pub const ERR_UNKNOWN_COMMAND: &str = "Unknown command";
    pub const ERR_UNREGISTERED_COMMAND: &str = "No handler registered for command";
    pub const ERR_EMPTY_COMMAND: &str = "Connection closed before a command was sent";
    pub const ERR_COMMAND_TOO_LONG: &str = "Command token exceeds maximum length";
    pub const ERR_NON_ASCII_COMMAND: &str = "Command token is not ASCII";
    pub const ERR_MISSING_REPLY: &str = "Peer closed the connection without a reply";

    /// Authentication errors
    pub const ERR_BAD_CREDENTIALS: &str = "bad username / password";
    pub const ERR_NO_NOTIFY_CREDENTIALS: &str = "Notification credentials are not configured";

    /// Lookup errors
    pub const ERR_RECORD_NOT_FOUND: &str = "Record not found";

    /// Container errors
    pub const ERR_MISSING_CONTAINER: &str = "Missing META-INF/container.xml";
    pub const ERR_MISSING_PACKAGE_ROOT: &str = "Package document has no package element";

    /// Cryptographic errors
    pub const ERR_MISSING_USER_KEY: &str = "Missing user key";
    pub const ERR_INVALID_KEY_LENGTH: &str = "Key material must be 32 bytes";
    pub const ERR_ENCRYPTION_FAILED: &str = "Encryption failed";
    pub const ERR_DECRYPTION_FAILED: &str = "Decryption failed";
    pub const ERR_KEY_CERT_MISMATCH: &str = "Signing key does not match the published certificate";

    /// Storage errors
    pub const ERR_CHECKSUM_MISMATCH: &str = "Checksum of the uploaded payload does not match";
    pub const ERR_SIZE_MISMATCH: &str = "Size of the uploaded payload does not match";
}

/// Coarse classification of an [`LcpError`], used by the HTTP collaborator
/// to pick a status code without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidContainer,
    Encryption,
    Signing,
    Authentication,
    Protocol,
    Storage,
    ReadOnly,
    Config,
    Internal,
}

// LcpError is the primary error type for every core operation
#[derive(Error, Debug)]
pub enum LcpError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Error : {0}")]
    AuthenticationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Missing mandatory payload.")]
    MissingPayload,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Server is in read-only mode")]
    ReadOnly,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LcpError {
    /// Classify this error for callers that translate it into another surface.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LcpError::NotFound(_) => ErrorKind::NotFound,
            LcpError::InvalidContainer(_) | LcpError::Xml(_) | LcpError::Zip(_) => {
                ErrorKind::InvalidContainer
            }
            LcpError::EncryptionError(_) => ErrorKind::Encryption,
            LcpError::SigningError(_) => ErrorKind::Signing,
            LcpError::AuthenticationError(_) => ErrorKind::Authentication,
            LcpError::ProtocolError(_) | LcpError::MissingPayload => ErrorKind::Protocol,
            LcpError::StorageError(_) => ErrorKind::Storage,
            LcpError::ReadOnly => ErrorKind::ReadOnly,
            LcpError::ConfigError(_) => ErrorKind::Config,
            LcpError::Io(_) | LcpError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

impl From<quick_xml::Error> for LcpError {
    fn from(err: quick_xml::Error) -> Self {
        LcpError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for LcpError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        LcpError::Xml(err.to_string())
    }
}

impl From<serde_json::Error> for LcpError {
    fn from(err: serde_json::Error) -> Self {
        LcpError::Serialization(err.to_string())
    }
}

/// Type alias for Results using LcpError
pub type Result<T> = std::result::Result<T, LcpError>;
