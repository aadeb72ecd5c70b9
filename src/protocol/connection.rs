use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use super::command::Command;
use crate::core::codec::{decode_value, encode_value, CommandCodec, Frame};
use crate::error::{constants, LcpError, Result};

/// Byte stream a connection can run over
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// One command exchange over a framed stream. Handlers receive it after the
/// command token has been consumed.
pub struct Connection {
    framed: Framed<Box<dyn Io>, CommandCodec>,
}

impl Connection {
    /// Accepted side: expects a command token first.
    pub fn server<S: Io + 'static>(io: S) -> Self {
        Self {
            framed: Framed::new(Box::new(io), CommandCodec::server()),
        }
    }

    /// Connecting side: sends a command, reads values back.
    pub fn client<S: Io + 'static>(io: S) -> Self {
        Self {
            framed: Framed::new(Box::new(io), CommandCodec::client()),
        }
    }

    /// The command token, or `None` when the peer closed without sending one.
    pub async fn read_command(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(Frame::Token(token))) => Ok(Some(token)),
            Some(Ok(Frame::Value(_))) => Err(LcpError::ProtocolError(
                constants::ERR_EMPTY_COMMAND.into(),
            )),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Decode the next value. End of stream before any byte of it is
    /// [`LcpError::MissingPayload`].
    pub async fn read_payload<T: DeserializeOwned>(&mut self) -> Result<T> {
        match self.framed.next().await {
            Some(Ok(Frame::Value(bytes))) => decode_value(&bytes),
            Some(Ok(Frame::Token(token))) => Err(LcpError::ProtocolError(format!(
                "unexpected command token {token:?}"
            ))),
            Some(Err(e)) => Err(e),
            None => Err(LcpError::MissingPayload),
        }
    }

    pub async fn write_command(&mut self, command: Command) -> Result<()> {
        self.framed
            .feed(Frame::Token(command.token().to_string()))
            .await
    }

    /// Encode and flush one value.
    pub async fn write_value<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.framed.send(Frame::Value(encode_value(value)?)).await
    }

    /// Flush and close the write half. Reads remain possible.
    pub async fn finish_writes(&mut self) -> Result<()> {
        self.framed.flush().await?;
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }
}
