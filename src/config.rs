//! Pipe configuration parsing and validation.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the well-known `DebugServer` channel with a 4096-byte message
//! limit, a 16-byte reply buffer and an unbounded client wait.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ipc::client::{CallOptions, WaitTimeout};
use crate::ipc::{
    DEFAULT_PIPE_NAME, IDLE_TIMEOUT, MAX_MESSAGE_BYTES, POLL_INTERVAL, REPLY_CAPACITY,
};
use crate::{AppError, Result};

/// Upper bound accepted for `max_message_bytes`: 16 MiB.
pub const MESSAGE_BYTES_CEILING: usize = 16 * 1024 * 1024;

fn default_pipe_name() -> String {
    DEFAULT_PIPE_NAME.into()
}

fn default_max_message_bytes() -> usize {
    MAX_MESSAGE_BYTES
}

fn default_reply_capacity() -> usize {
    REPLY_CAPACITY
}

fn default_idle_timeout_ms() -> u64 {
    duration_millis(IDLE_TIMEOUT)
}

fn default_poll_interval_ms() -> u64 {
    duration_millis(POLL_INTERVAL)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Debug pipe configuration parsed from `debug-pipe.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PipeConfig {
    /// Well-known channel name shared by the server and all clients.
    #[serde(default = "default_pipe_name")]
    pub pipe_name: String,
    /// Largest message body the channel carries.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Client-side reply buffer; longer replies are truncated.
    #[serde(default = "default_reply_capacity")]
    pub reply_capacity: usize,
    /// How long the server holds a connected client that sends nothing.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// How long a client waits for the server; 0 means wait forever.
    #[serde(default)]
    pub wait_seconds: u64,
    /// Delay between client connection attempts while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            pipe_name: default_pipe_name(),
            max_message_bytes: default_max_message_bytes(),
            reply_capacity: default_reply_capacity(),
            idle_timeout_ms: default_idle_timeout_ms(),
            wait_seconds: 0,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PipeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pipe_name.trim().is_empty() {
            return Err(AppError::Config("pipe_name must not be empty".into()));
        }
        if self.pipe_name.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "pipe_name must not contain path separators: {}",
                self.pipe_name
            )));
        }
        if self.max_message_bytes == 0 || self.max_message_bytes > MESSAGE_BYTES_CEILING {
            return Err(AppError::Config(format!(
                "max_message_bytes must be between 1 and {MESSAGE_BYTES_CEILING}, got {}",
                self.max_message_bytes
            )));
        }
        if self.reply_capacity == 0 || self.reply_capacity > self.max_message_bytes {
            return Err(AppError::Config(format!(
                "reply_capacity must be between 1 and max_message_bytes ({}), got {}",
                self.max_message_bytes, self.reply_capacity
            )));
        }
        if self.idle_timeout_ms == 0 {
            return Err(AppError::Config("idle_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Server-side inactivity limit for a connected client.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Client wait policy; `wait_seconds = 0` maps to [`WaitTimeout::Forever`].
    #[must_use]
    pub fn wait(&self) -> WaitTimeout {
        match self.wait_seconds {
            0 => WaitTimeout::Forever,
            secs => WaitTimeout::After(Duration::from_secs(secs)),
        }
    }

    /// Options for a single client call derived from this configuration.
    #[must_use]
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            max_message_bytes: self.max_message_bytes,
            reply_capacity: self.reply_capacity,
            wait: self.wait(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}
