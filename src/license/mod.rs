//! # Licenses
//!
//! The license document, its assembly from a draft, and its signature.
//!
//! ## Components
//! - **model**: the JSON license document and its parts
//! - **builder**: profile, links, field encryption and signing, in that order
//! - **signing**: Ed25519 signer bound to a published certificate

pub mod builder;
pub mod model;
pub mod signing;

pub use builder::LicenseBuilder;
pub use model::{
    ContentKey, Encryption, License, Link, Rights, Signature, UserInfo, UserKey,
    CONTENT_TYPE_LCP_JSON, CONTENT_TYPE_LSD_JSON, REL_HINT, REL_PUBLICATION, REL_STATUS,
};
pub use signing::{verify_signature, LicenseSigner, ALGORITHM_ED25519};
