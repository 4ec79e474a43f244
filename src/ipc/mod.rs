//! Named duplex debug channel.
//!
//! Provides a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! carrying length-delimited messages, so message boundaries survive on
//! every platform. A long-lived [`server::DebugServer`] accepts one client
//! at a time; [`client::call_pipe`] is the one-shot send-and-wait call.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, Name, NameType, ToFsName, ToNsName,
};

use crate::{AppError, Result};

pub mod client;
pub mod codec;
pub mod server;

/// Well-known channel name shared by the server and its clients.
pub const DEFAULT_PIPE_NAME: &str = "DebugServer";

/// A message may not be larger than this size.
pub const MAX_MESSAGE_BYTES: usize = 4096;

/// Reply buffer a client reserves for the acknowledgment.
pub const REPLY_CAPACITY: usize = 16;

/// Acknowledgment body written back after each message.
pub const ACK_BODY: &[u8] = b"OK";

/// How long a connected client may stay silent before it is dropped.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between connection attempts while a client waits for the server.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Validated channel name.
///
/// Resolves to `\\.\pipe\<name>` on Windows and an abstract socket on Linux.
/// Platforms without namespaced sockets fall back to `<temp_dir>/<name>.sock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeName(String);

impl PipeName {
    /// Validate `raw` as a channel name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the name is empty or contains a path
    /// separator.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AppError::Ipc("pipe name must not be empty".into()));
        }
        if raw.contains(['/', '\\']) {
            return Err(AppError::Ipc(format!(
                "pipe name must not contain path separators: {raw}"
            )));
        }
        Ok(Self(raw))
    }

    /// The name as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve to the platform local-socket name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the platform rejects the name.
    pub fn to_name(&self) -> Result<Name<'static>> {
        let resolved = if GenericNamespaced::is_supported() {
            self.0.clone().to_ns_name::<GenericNamespaced>()
        } else {
            std::env::temp_dir()
                .join(format!("{}.sock", self.0))
                .to_fs_name::<GenericFilePath>()
        };
        resolved.map_err(|err| AppError::Ipc(format!("invalid pipe name '{}': {err}", self.0)))
    }
}

impl Display for PipeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
