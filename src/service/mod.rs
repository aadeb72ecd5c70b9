//! # Services
//!
//! Operations exposed to the HTTP collaborator and to the command protocol
//! handlers, on top of a shared [`ServerContext`].
//!
//! ## Components
//! - **context**: configuration, stores, storage, signer and metrics
//! - **content**: encrypted publication registration
//! - **licenses**: license issuance, retrieval, packaging and update

mod content;
mod context;
mod licenses;

pub use content::ContentService;
pub use context::ServerContext;
pub use licenses::LicenseService;
