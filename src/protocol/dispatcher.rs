use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use super::command::Command;
use super::connection::Connection;
use crate::error::{constants, LcpError, Result};

/// Handles one command. The token has already been consumed; the handler
/// reads its payload from `conn`. The endpoint writes the reply.
pub trait CommandHandler: Send + Sync + 'static {
    fn handle<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, Result<()>>;
}

/// Command routing table, indexed by [`Command`]. Filled at construction
/// and read-only afterwards.
pub struct Dispatcher {
    handlers: [Option<Arc<dyn CommandHandler>>; Command::COUNT],
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Default::default(),
        }
    }

    /// Install `handler` for `command`, replacing any previous one.
    pub fn register(&mut self, command: Command, handler: Arc<dyn CommandHandler>) -> &mut Self {
        self.handlers[command.index()] = Some(handler);
        self
    }

    pub fn is_registered(&self, command: Command) -> bool {
        self.handlers[command.index()].is_some()
    }

    /// Map a token to its handler. Unknown or unregistered tokens fail
    /// before anything else is read from the connection.
    pub fn resolve(&self, token: &str) -> Result<(Command, Arc<dyn CommandHandler>)> {
        let command = Command::from_token(token).ok_or_else(|| {
            LcpError::ProtocolError(format!("{}: {token:?}", constants::ERR_UNKNOWN_COMMAND))
        })?;

        self.handlers[command.index()]
            .clone()
            .map(|handler| (command, handler))
            .ok_or_else(|| {
                LcpError::ProtocolError(format!(
                    "{}: {command}",
                    constants::ERR_UNREGISTERED_COMMAND
                ))
            })
    }

    pub async fn dispatch(&self, token: &str, conn: &mut Connection) -> Result<()> {
        let (command, handler) = self.resolve(token)?;
        debug!(%command, "Dispatching command");
        handler.handle(conn).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl CommandHandler for Counting {
        fn handle<'a>(&'a self, _conn: &'a mut Connection) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_dispatch_registered() {
        let handler = Arc::new(Counting(AtomicUsize::new(0)));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Command::UpdateLicense, handler.clone());

        let (io, _peer) = tokio::io::duplex(64);
        let mut conn = Connection::server(io);
        dispatcher.dispatch("UPDATELICENSE", &mut conn).await.unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_and_unregistered() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.resolve("DELETEEVERYTHING"),
            Err(LcpError::ProtocolError(_))
        ));
        assert!(matches!(
            dispatcher.resolve("CREATECONTENT"),
            Err(LcpError::ProtocolError(_))
        ));
    }
}
