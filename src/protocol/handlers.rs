use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use super::command::Command;
use super::connection::Connection;
use super::dispatcher::{CommandHandler, Dispatcher};
use super::message::{AuthAndContentPayload, AuthAndLicense};
use crate::error::{constants, LcpError, Result};
use crate::service::{ContentService, LicenseService, ServerContext};

/// `UPDATELICENSE`: authenticate, then merge the sent license into the
/// stored one.
pub struct UpdateLicenseHandler {
    ctx: Arc<ServerContext>,
    licenses: LicenseService,
}

impl UpdateLicenseHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let licenses = LicenseService::new(ctx.clone());
        Self { ctx, licenses }
    }
}

impl CommandHandler for UpdateLicenseHandler {
    fn handle<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let payload: AuthAndLicense = conn.read_payload().await?;
            self.ctx.authenticate(&payload.user, &payload.password)?;

            let license = self.licenses.apply_update(payload.license).map_err(|e| match e {
                LcpError::NotFound(_) => {
                    LcpError::NotFound(constants::ERR_RECORD_NOT_FOUND.into())
                }
                other => other,
            })?;
            info!(license_id = %license.id, "License updated by peer");
            Ok(())
        })
    }
}

/// `CREATECONTENT`: authenticate, then register the sent publication.
pub struct CreateContentHandler {
    ctx: Arc<ServerContext>,
}

impl CreateContentHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }
}

impl CommandHandler for CreateContentHandler {
    fn handle<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let payload: AuthAndContentPayload = conn.read_payload().await?;
            self.ctx.authenticate(&payload.user, &payload.password)?;

            // archive validation and hashing block on file I/O
            let contents = ContentService::new(self.ctx.clone());
            let content = tokio::task::spawn_blocking(move || contents.add_content(payload.content))
                .await
                .map_err(|e| LcpError::StorageError(format!("content task failed: {e}")))??;
            info!(content_id = %content.id, "Content registered by peer");
            Ok(())
        })
    }
}

/// Dispatcher with the license server's command handlers installed.
pub fn license_server_dispatcher(ctx: Arc<ServerContext>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(
            Command::UpdateLicense,
            Arc::new(UpdateLicenseHandler::new(ctx.clone())),
        )
        .register(Command::CreateContent, Arc::new(CreateContentHandler::new(ctx)));
    dispatcher
}
