//! # Core Protocol Components
//!
//! Framing of the server-to-server command protocol.
//!
//! ## Wire Format
//! ```text
//! request:  <COMMAND TOKEN>\n <MessagePack value>
//! reply:    <MessagePack value>
//! ```
//!
//! ## Security
//! - Command tokens are ASCII and bounded in length
//! - Unknown tokens are rejected before any payload is read
//! - Values above 256MB are rejected

pub mod codec;
