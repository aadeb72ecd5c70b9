//! Status notification.
//!
//! After a license is issued, the companion status server is told about it
//! with an `UPDATELICENSESTATUS` exchange. Notification is best effort: every
//! failure is logged and counted, never returned to the issuing request.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::command::Command;
use super::connection::Connection;
use super::message::{AuthAndLicense, ReplyError};
use crate::config::Credentials;
use crate::error::{constants, LcpError, Result};
use crate::license::License;
use crate::service::ServerContext;
use crate::store::{LicenseStore, STATUS_CREATED};
use crate::utils::Metrics;

pub struct StatusNotifier {
    address: String,
    credentials: Credentials,
    licenses: Arc<dyn LicenseStore>,
    metrics: Arc<Metrics>,
}

impl StatusNotifier {
    pub fn new(
        address: impl Into<String>,
        credentials: Credentials,
        licenses: Arc<dyn LicenseStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            address: address.into(),
            credentials,
            licenses,
            metrics,
        }
    }

    pub fn from_context(ctx: &ServerContext) -> Self {
        Self::new(
            ctx.config.status.address.clone(),
            ctx.config.status.notify_auth.clone(),
            ctx.licenses.clone(),
            ctx.metrics.clone(),
        )
    }

    /// Notify and log the outcome. Delivery and the local status marker
    /// are logged and counted separately.
    pub async fn notify(&self, license: &License) {
        match self.deliver(license).await {
            Ok(()) => {
                self.metrics.notification_sent();
                info!(license_id = %license.id, "Status server notified");
            }
            Err(LcpError::AuthenticationError(reason)) => {
                self.metrics.notification_failed();
                warn!(license_id = %license.id, %reason, "Status notification skipped");
                return;
            }
            Err(e) => {
                self.metrics.notification_failed();
                error!(license_id = %license.id, error = %e, "Status notification failed");
                return;
            }
        }

        if let Err(e) = self.licenses.update_status(&license.id, STATUS_CREATED) {
            self.metrics.status_update_failed();
            error!(license_id = %license.id, error = %e, "Could not record license status");
        }
    }

    /// Run [`StatusNotifier::notify`] in the background.
    pub fn spawn_notify(self: Arc<Self>, license: License) -> JoinHandle<()> {
        tokio::spawn(async move { self.notify(&license).await })
    }

    /// One notification exchange. On an empty reply the license status is
    /// recorded as created.
    pub async fn try_notify(&self, license: &License) -> Result<()> {
        self.deliver(license).await?;
        self.licenses.update_status(&license.id, STATUS_CREATED)
    }

    #[instrument(skip(self, license), fields(license_id = %license.id, address = %self.address))]
    async fn deliver(&self, license: &License) -> Result<()> {
        // without credentials nothing is sent at all
        if !self.credentials.is_configured() {
            return Err(LcpError::AuthenticationError(
                constants::ERR_NO_NOTIFY_CREDENTIALS.into(),
            ));
        }

        let stream = TcpStream::connect(&self.address).await?;
        let mut conn = Connection::client(stream);

        conn.write_command(Command::UpdateLicenseStatus).await?;
        let payload = AuthAndLicense::new(
            self.credentials.username.clone(),
            self.credentials.password.clone(),
            license.clone(),
        );
        conn.write_value(&payload).await?;
        conn.finish_writes().await?;

        // a peer closing without a reply counts as success
        let reply = match conn.read_payload::<ReplyError>().await {
            Ok(reply) => reply,
            Err(LcpError::MissingPayload) => {
                debug!("{}", constants::ERR_MISSING_REPLY);
                ReplyError::ok()
            }
            Err(e) => return Err(e),
        };

        if !reply.is_ok() {
            return Err(LcpError::ProtocolError(format!(
                "status server replied: {}",
                reply.message
            )));
        }

        Ok(())
    }
}
