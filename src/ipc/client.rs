//! One-shot client call: connect, send one message, wait for the reply.

use std::io::ErrorKind;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use interprocess::local_socket::tokio::{prelude::*, Stream};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use super::codec::{check_message_len, MessageCodec};
use super::{PipeName, MAX_MESSAGE_BYTES, POLL_INTERVAL, REPLY_CAPACITY};
use crate::{AppError, Result};

/// Windows `ERROR_PIPE_BUSY`: every pipe instance is serving another client.
const ERROR_PIPE_BUSY: i32 = 231;

/// How long a client waits for the server to accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Keep trying until the server shows up.
    Forever,
    /// Give up once this much time has passed.
    After(Duration),
}

/// Parameters of a single [`call_pipe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// Largest message body the channel carries.
    pub max_message_bytes: usize,
    /// Reply bytes kept; the remainder is discarded.
    pub reply_capacity: usize,
    /// Wait policy for an absent or busy server.
    pub wait: WaitTimeout,
    /// Delay between connection attempts while waiting.
    pub poll_interval: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_message_bytes: MAX_MESSAGE_BYTES,
            reply_capacity: REPLY_CAPACITY,
            wait: WaitTimeout::Forever,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Result of a completed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallReply {
    /// Reply body, truncated to the reply capacity; `None` when the server
    /// disconnected before a reply arrived.
    pub reply: Option<Bytes>,
}

/// Send `body` to the server behind `pipe` and wait for its reply.
///
/// The size check happens before the channel is opened. A server that
/// disconnects instead of replying does not fail the call.
///
/// # Errors
///
/// - `AppError::Frame` if `body` exceeds `options.max_message_bytes`.
/// - `AppError::Timeout` if a finite wait elapses before the server accepts.
/// - `AppError::Ipc` if connecting fails for a reason other than the
///   server being absent or busy.
/// - `AppError::Io` if the request cannot be written.
pub async fn call_pipe(pipe: &PipeName, body: Bytes, options: &CallOptions) -> Result<CallReply> {
    check_message_len(body.len(), options.max_message_bytes)?;

    let stream = connect(pipe, options).await?;
    let mut framed = Framed::new(stream, MessageCodec::new(options.max_message_bytes));
    framed.send(body).await?;

    let reply = match framed.next().await {
        Some(Ok(mut frame)) => {
            frame.truncate(options.reply_capacity);
            Some(frame)
        }
        Some(Err(err)) => {
            debug!(%err, "reply lost to server disconnect");
            None
        }
        None => {
            debug!("server disconnected without a reply");
            None
        }
    };

    Ok(CallReply { reply })
}

async fn connect(pipe: &PipeName, options: &CallOptions) -> Result<Stream> {
    let attempts = connect_when_available(pipe, options.poll_interval);
    match options.wait {
        WaitTimeout::Forever => attempts.await,
        WaitTimeout::After(limit) => tokio::time::timeout(limit, attempts)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "pipe '{pipe}' not available within {} ms",
                    limit.as_millis()
                ))
            })?,
    }
}

async fn connect_when_available(pipe: &PipeName, poll_interval: Duration) -> Result<Stream> {
    loop {
        match Stream::connect(pipe.to_name()?).await {
            Ok(stream) => return Ok(stream),
            Err(err) if server_unavailable(&err) => {
                trace!(pipe_name = %pipe, %err, "server not available yet");
                tokio::time::sleep(poll_interval).await;
            }
            Err(err) => {
                return Err(AppError::Ipc(format!(
                    "failed to connect to pipe '{pipe}': {err}"
                )))
            }
        }
    }
}

fn server_unavailable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::NotFound | ErrorKind::ConnectionRefused
    ) || (cfg!(windows) && err.raw_os_error() == Some(ERROR_PIPE_BUSY))
}
