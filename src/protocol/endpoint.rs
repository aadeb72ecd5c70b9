use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use super::connection::Connection;
use super::dispatcher::Dispatcher;
use super::message::ReplyError;
use crate::error::Result;
use crate::utils::Metrics;

/// TCP listener for the command protocol. Each accepted connection carries
/// exactly one command and gets exactly one reply.
pub struct Endpoint {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
}

impl Endpoint {
    #[instrument(skip(dispatcher, metrics))]
    pub async fn bind(address: &str, dispatcher: Dispatcher, metrics: Arc<Metrics>) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        info!(address = %listener.local_addr()?, "Command endpoint listening");
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            metrics,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until CTRL+C.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Serve until `shutdown_rx` fires or its sender is dropped.
    /// Connections already accepted finish on their own.
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(
                        active = self.metrics.snapshot().connections_active,
                        "Command endpoint stopped accepting"
                    );
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let dispatcher = self.dispatcher.clone();
                            let metrics = self.metrics.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, dispatcher, metrics).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }
}

#[instrument(skip(stream, dispatcher, metrics))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
) {
    metrics.connection_established();
    let mut conn = Connection::server(stream);

    let result = match conn.read_command().await {
        Ok(Some(token)) => {
            metrics.command_dispatched();
            dispatcher.dispatch(&token, &mut conn).await
        }
        Ok(None) => {
            debug!("Peer closed before sending a command");
            metrics.connection_closed();
            return;
        }
        Err(e) => Err(e),
    };

    let reply = match &result {
        Ok(()) => {
            metrics.command_succeeded();
            ReplyError::ok()
        }
        Err(e) => {
            metrics.command_failed();
            if e.kind() == crate::error::ErrorKind::Protocol {
                metrics.protocol_error();
            }
            warn!(error = %e, "Command failed");
            ReplyError::from_error(e)
        }
    };

    if let Err(e) = conn.write_value(&reply).await {
        debug!(error = %e, "Could not deliver reply");
    }
    let _ = conn.finish_writes().await;
    metrics.connection_closed();
}
