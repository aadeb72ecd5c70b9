//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging and metrics.
//!
//! ## Components
//! - **Crypto**: XChaCha20-Poly1305 sealing of license fields, key derivation helpers
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom) for nonces
//! - Memory zeroing for nonces and key material (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot, Timer};
