//! # lcp-core
//!
//! Core of a content-protection license server: signed license issuance,
//! licensed publication packaging, EPUB container reading and the
//! server-to-server command protocol.
//!
//! ## Modules
//! - **epub**: container reader, package documents, encryption descriptor codec
//! - **license**: license model, builder and signer
//! - **pack**: license embedding into publication archives
//! - **core**: command protocol framing
//! - **protocol**: command endpoint, handlers and status notifier
//! - **service**: server context, content and license services
//! - **store** / **storage**: record stores and object storage
//! - **config**, **error**, **utils**: configuration, error taxonomy, crypto/logging/metrics
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use lcp_core::config::LcpConfig;
//! use lcp_core::license::LicenseSigner;
//! use lcp_core::protocol::{license_server_dispatcher, Endpoint};
//! use lcp_core::service::ServerContext;
//!
//! # async fn serve() -> lcp_core::error::Result<()> {
//! let config = LcpConfig::from_file("lcp.toml")?;
//! config.validate_strict()?;
//! lcp_core::utils::logging::init_logging(&config.logging);
//!
//! let address = config.server.address.clone();
//! let ctx = Arc::new(ServerContext::in_memory(config, LicenseSigner::generate()));
//! let endpoint = Endpoint::bind(&address, license_server_dispatcher(ctx.clone()), ctx.metrics.clone()).await?;
//! endpoint.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod epub;
pub mod error;
pub mod license;
pub mod pack;
pub mod protocol;
pub mod service;
pub mod storage;
pub mod store;
pub mod utils;

pub use error::{LcpError, Result};
