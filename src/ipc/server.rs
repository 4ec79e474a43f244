//! Debug server: the single long-lived owner of the channel.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Connections are served strictly one at a
//! time; a client that connects while another is being served waits at the
//! OS layer until the current connection is torn down.
//!
//! ## Cycle
//!
//! ```text
//! LISTENING -> CONNECTED -> read -> print -> ack (best effort) -> DISCONNECTED
//! ```
//!
//! The acknowledgment write races the forced disconnect on the client side,
//! so its failure is reported as [`BestEffort::Abandoned`] and otherwise
//! ignored. Every other per-connection failure is logged and the loop moves
//! on to the next client.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use interprocess::local_socket::{
    tokio::{prelude::*, Listener, Stream},
    ListenerOptions,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::codec::MessageCodec;
use super::{PipeName, ACK_BODY};
use crate::config::PipeConfig;
use crate::{AppError, Result};

/// Outcome of an operation whose failure is expected under normal races.
#[must_use]
#[derive(Debug)]
pub enum BestEffort {
    /// The operation completed.
    Done,
    /// The operation failed and was skipped.
    Abandoned(AppError),
}

impl BestEffort {
    /// Whether the operation completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Counters reported when [`DebugServer::serve`] returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    /// Connections accepted.
    pub connections: u64,
    /// Messages printed.
    pub messages: u64,
    /// Connections dropped without a message (read error, idle, hang-up).
    pub dropped: u64,
}

/// Owner of the listening channel.
///
/// Constructed once at startup; the channel is released when
/// [`DebugServer::serve`] returns and the server is dropped.
pub struct DebugServer {
    listener: Listener,
    name: PipeName,
    max_message_bytes: usize,
    idle_timeout: Duration,
}

impl DebugServer {
    /// Create the named channel described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the name is invalid or the listener cannot
    /// be created (for example, another server already owns the name).
    pub fn bind(config: &PipeConfig) -> Result<Self> {
        let name = PipeName::new(config.pipe_name.clone())?;

        let listener = ListenerOptions::new()
            .name(name.to_name()?)
            .create_tokio()
            .map_err(|err| AppError::Ipc(format!("failed to create pipe '{name}': {err}")))?;

        info!(
            pipe_name = %name,
            max_message_bytes = config.max_message_bytes,
            idle_timeout_ms = config.idle_timeout_ms,
            "debug server listening"
        );

        Ok(Self {
            listener,
            name,
            max_message_bytes: config.max_message_bytes,
            idle_timeout: config.idle_timeout(),
        })
    }

    /// Name of the channel this server owns.
    #[must_use]
    pub fn name(&self) -> &PipeName {
        &self.name
    }

    /// Serve clients one at a time until `ct` is cancelled.
    ///
    /// Each received message is written to `out` followed by `\n` and
    /// flushed before the acknowledgment is attempted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if writing to `out` fails. Per-connection
    /// failures are logged and never end the loop.
    pub async fn serve<W>(self, mut out: W, ct: CancellationToken) -> Result<ServeSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let span = info_span!("debug_server", pipe_name = %self.name);
        async move {
            let mut summary = ServeSummary::default();
            loop {
                let stream = tokio::select! {
                    () = ct.cancelled() => {
                        info!("debug server shutting down");
                        break;
                    }
                    accepted = self.listener.accept() => match accepted {
                        Ok(stream) => stream,
                        Err(err) => {
                            warn!(%err, "pipe accept failed");
                            continue;
                        }
                    },
                };
                summary.connections += 1;

                let mut conn = Connection::new(stream, self.max_message_bytes);
                let received = conn
                    .read_message(self.idle_timeout)
                    .instrument(info_span!("pipe_conn", seq = summary.connections))
                    .await;

                match received {
                    Ok(message) => {
                        emit(&mut out, &message).await?;
                        summary.messages += 1;
                        if let BestEffort::Abandoned(err) = conn.acknowledge().await {
                            debug!(%err, "acknowledgment not delivered");
                        }
                    }
                    Err(err) => {
                        summary.dropped += 1;
                        warn!(%err, "connection dropped without a message");
                        conn.disconnect();
                    }
                }
            }

            info!(
                connections = summary.connections,
                messages = summary.messages,
                dropped = summary.dropped,
                "debug server stopped"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

/// One client exchange; dropping it disconnects the client.
struct Connection {
    framed: Framed<Stream, MessageCodec>,
}

impl Connection {
    fn new(stream: Stream, max_message_bytes: usize) -> Self {
        Self {
            framed: Framed::new(stream, MessageCodec::new(max_message_bytes)),
        }
    }

    /// Read at most one message, giving up after `idle` of silence.
    async fn read_message(&mut self, idle: Duration) -> Result<Bytes> {
        match tokio::time::timeout(idle, self.framed.next()).await {
            Err(_) => Err(AppError::Timeout(format!(
                "client sent nothing within {} ms",
                idle.as_millis()
            ))),
            Ok(None) => Err(AppError::Ipc("client disconnected before sending".into())),
            Ok(Some(frame)) => {
                let message = frame?;
                debug!(bytes = message.len(), "message received");
                Ok(message)
            }
        }
    }

    /// Write the fixed acknowledgment, then disconnect whatever happened.
    async fn acknowledge(mut self) -> BestEffort {
        let outcome = match self.framed.send(Bytes::from_static(ACK_BODY)).await {
            Ok(()) => BestEffort::Done,
            Err(err) => BestEffort::Abandoned(err),
        };
        self.disconnect();
        outcome
    }

    fn disconnect(self) {
        drop(self.framed);
    }
}

async fn emit<W>(out: &mut W, message: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = String::from_utf8_lossy(message).into_owned();
    line.push('\n');
    out.write_all(line.as_bytes())
        .await
        .map_err(|err| AppError::Io(format!("failed to write message: {err}")))?;
    out.flush()
        .await
        .map_err(|err| AppError::Io(format!("failed to flush output: {err}")))
}
