//! # Command Protocol
//!
//! Server-to-server commands between the license server, the encryption
//! tool and the companion status server.
//!
//! ## Exchange
//! ```text
//! client                              server
//!   | ---- TOKEN\n ------------------> |   resolve handler (unknown: error reply)
//!   | ---- payload value ------------> |   authenticate, act
//!   | <--- ReplyError value ---------- |   empty message on success
//!   |             close                |
//! ```
//!
//! ## Components
//! - **command**: the command set and its tokens
//! - **message**: payload and reply types
//! - **connection**: framed exchange over any byte stream
//! - **dispatcher**: token to handler table
//! - **handlers**: `UPDATELICENSE` and `CREATECONTENT`
//! - **endpoint**: TCP accept loop
//! - **notifier**: outbound `UPDATELICENSESTATUS`

pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod handlers;
pub mod message;
pub mod notifier;


pub use command::Command;
pub use connection::Connection;
pub use dispatcher::{CommandHandler, Dispatcher};
pub use endpoint::Endpoint;
pub use handlers::{license_server_dispatcher, CreateContentHandler, UpdateLicenseHandler};
pub use message::{AuthAndContentPayload, AuthAndLicense, ContentPayload, ReplyError};
pub use notifier::StatusNotifier;
