use std::sync::Arc;

use crate::config::LcpConfig;
use crate::error::{constants, LcpError, Result};
use crate::license::LicenseSigner;
use crate::storage::{MemoryStorage, Storage};
use crate::store::{ContentStore, LicenseStore, MemoryStore};
use crate::utils::Metrics;

/// Everything a request needs: configuration, the record stores, object
/// storage, the signing identity and counters. Built once at startup and
/// shared by `Arc`.
pub struct ServerContext {
    pub config: LcpConfig,
    pub contents: Arc<dyn ContentStore>,
    pub licenses: Arc<dyn LicenseStore>,
    pub storage: Arc<dyn Storage>,
    pub signer: LicenseSigner,
    pub metrics: Arc<Metrics>,
}

impl ServerContext {
    pub fn new(
        config: LcpConfig,
        contents: Arc<dyn ContentStore>,
        licenses: Arc<dyn LicenseStore>,
        storage: Arc<dyn Storage>,
        signer: LicenseSigner,
    ) -> Self {
        Self {
            config,
            contents,
            licenses,
            storage,
            signer,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Context backed by process memory only.
    pub fn in_memory(config: LcpConfig, signer: LicenseSigner) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryStorage::new(config.public_base_url.clone()));
        Self::new(config, store.clone(), store, storage, signer)
    }

    /// Check credentials presented on the command protocol.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        if self.config.server.auth.matches(username, password) {
            Ok(())
        } else {
            Err(LcpError::AuthenticationError(format!(
                "{} (`{username}`)",
                constants::ERR_BAD_CREDENTIALS
            )))
        }
    }

    pub fn ensure_writable(&self) -> Result<()> {
        if self.config.server.read_only {
            Err(LcpError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::config::Credentials;

    fn context(read_only: bool) -> ServerContext {
        let config = LcpConfig::default_with_overrides(|c| {
            c.server.auth = Credentials::new("peer", "secret");
            c.server.read_only = read_only;
        });
        ServerContext::in_memory(config, LicenseSigner::generate())
    }

    #[test]
    fn test_authenticate() {
        let ctx = context(false);
        assert!(ctx.authenticate("peer", "secret").is_ok());

        let err = ctx.authenticate("peer", "wrong").unwrap_err();
        assert!(matches!(err, LcpError::AuthenticationError(_)));
        assert!(err.to_string().starts_with("Error : bad username / password"));
        assert!(!err.to_string().contains("wrong"));
    }

    #[test]
    fn test_read_only() {
        assert!(context(false).ensure_writable().is_ok());
        assert!(matches!(
            context(true).ensure_writable(),
            Err(LcpError::ReadOnly)
        ));
    }
}
