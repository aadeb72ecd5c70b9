//! # Publication Packaging
//!
//! Embeds a license into an encrypted publication archive at
//! `META-INF/license.lcpl`, copying every other entry byte-for-byte.

mod packager;

pub use packager::{extract_license, inject_license, serialize_license, Packager};
