use std::sync::Arc;

use tracing::{info, instrument};

use super::ServerContext;
use crate::error::{LcpError, Result};
use crate::license::{License, LicenseBuilder, UserInfo};
use crate::pack::Packager;
use crate::protocol::notifier::StatusNotifier;

/// License issuance, retrieval and update.
pub struct LicenseService {
    ctx: Arc<ServerContext>,
    notifier: Arc<StatusNotifier>,
    packager: Packager,
}

impl LicenseService {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let notifier = Arc::new(StatusNotifier::from_context(&ctx));
        let packager = Packager::new(ctx.storage.clone());
        Self {
            ctx,
            notifier,
            packager,
        }
    }

    pub fn with_notifier(ctx: Arc<ServerContext>, notifier: Arc<StatusNotifier>) -> Self {
        let packager = Packager::new(ctx.storage.clone());
        Self {
            ctx,
            notifier,
            packager,
        }
    }

    /// Build, persist and announce a new license. The status notification
    /// runs in the background and never fails this call.
    #[instrument(skip(self, draft), fields(content_id = %draft.content_id))]
    pub async fn generate_license(&self, draft: License) -> Result<License> {
        self.ctx.ensure_writable()?;

        let license = LicenseBuilder::new(&self.ctx).build(draft)?;
        self.ctx.licenses.add(license.clone())?;
        info!(license_id = %license.id, "License issued");

        self.notifier.clone().spawn_notify(license.clone());
        Ok(license)
    }

    /// New license plus the publication with that license embedded.
    pub async fn generate_licensed_publication(&self, draft: License) -> Result<(License, Vec<u8>)> {
        let license = self.generate_license(draft).await?;
        let publication = self.package(&license)?;
        Ok((license, publication))
    }

    /// Fresh copy of a stored license, rebuilt and re-signed with the user
    /// key carried by `draft`. Id and issue date are kept.
    #[instrument(skip(self, draft))]
    pub fn get_license(&self, id: &str, draft: License) -> Result<License> {
        let mut license = self.ctx.licenses.get(id)?;
        license.encryption.user_key.value = draft.encryption.user_key.value;
        if !draft.encryption.user_key.text_hint.is_empty() {
            license.encryption.user_key.text_hint = draft.encryption.user_key.text_hint;
        }
        license.signature = None;

        if draft.user == UserInfo::default() {
            LicenseBuilder::new(&self.ctx).keep_user_fields().build(license)
        } else {
            license.user = draft.user;
            LicenseBuilder::new(&self.ctx).build(license)
        }
    }

    pub fn licensed_publication(&self, id: &str, draft: License) -> Result<Vec<u8>> {
        let license = self.get_license(id, draft)?;
        self.package(&license)
    }

    /// Replace the stored license's fields, except its id and content id.
    /// Refused in read-only mode. Concurrent updates of one license are not
    /// serialized: the last write wins.
    pub fn update_license(&self, incoming: License) -> Result<License> {
        self.ctx.ensure_writable()?;
        self.apply_update(incoming)
    }

    /// Update path for the peer server's `UPDATELICENSE` command, which
    /// stays available in read-only mode.
    #[instrument(skip(self, incoming), fields(license_id = %incoming.id))]
    pub fn apply_update(&self, incoming: License) -> Result<License> {
        if incoming.id.is_empty() {
            return Err(LcpError::NotFound("license id is empty".into()));
        }

        let mut stored = self.ctx.licenses.get(&incoming.id)?;
        stored.update(incoming);
        self.ctx.licenses.update(stored.clone())?;

        info!("License updated");
        Ok(stored)
    }

    fn package(&self, license: &License) -> Result<Vec<u8>> {
        let content = self.ctx.contents.get(&license.content_id)?;
        self.packager.package(license, &content.location)
    }
}
