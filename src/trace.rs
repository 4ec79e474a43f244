//! In-process tracer that ships log lines to a running debug server.
//!
//! Intended for programs whose own console is unusable for diagnostics;
//! every call is a complete [`call_pipe`] round trip, so the server
//! interleaves lines from many processes in arrival order.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::config::PipeConfig;
use crate::ipc::client::{call_pipe, CallOptions};
use crate::ipc::PipeName;
use crate::message::{native_line, truncate_to, Clock, Stamp, SystemClock, TRACE_LINE_LIMIT};
use crate::Result;

static NEXT_THREAD_ORDINAL: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ORDINAL: u64 = NEXT_THREAD_ORDINAL.fetch_add(1, Ordering::Relaxed);
}

/// Small per-process number identifying the calling thread.
#[must_use]
pub fn thread_ordinal() -> u64 {
    THREAD_ORDINAL.with(|ordinal| *ordinal)
}

/// Sends trace lines to the debug server.
pub struct Tracer {
    pipe: PipeName,
    options: CallOptions,
    module: String,
    clock: Box<dyn Clock>,
}

impl Tracer {
    /// Build a tracer for the channel named in `config`, stamping lines
    /// with the current executable's file name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the configured pipe name is invalid.
    pub fn new(config: &PipeConfig) -> Result<Self> {
        Ok(Self {
            pipe: PipeName::new(config.pipe_name.clone())?,
            options: config.call_options(),
            module: current_module_name(),
            clock: Box::new(SystemClock),
        })
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the module name printed in each line.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// The line [`Tracer::trace`] would send for `text` right now.
    #[must_use]
    pub fn format(&self, text: &str) -> String {
        let line = native_line(
            Stamp::now(self.clock.as_ref()),
            &self.module,
            std::process::id(),
            thread_ordinal(),
            truncate_to(text, TRACE_LINE_LIMIT),
        );
        truncate_to(&line, TRACE_LINE_LIMIT).to_owned()
    }

    /// Send `text` prefixed with time, module, process and thread.
    ///
    /// # Errors
    ///
    /// Propagates [`call_pipe`] failures.
    pub async fn trace(&self, text: &str) -> Result<()> {
        self.send(self.format(text)).await
    }

    /// Send `text` as-is, capped at [`TRACE_LINE_LIMIT`] bytes.
    ///
    /// # Errors
    ///
    /// Propagates [`call_pipe`] failures.
    pub async fn trace_raw(&self, text: &str) -> Result<()> {
        self.send(truncate_to(text, TRACE_LINE_LIMIT).to_owned())
            .await
    }

    async fn send(&self, line: String) -> Result<()> {
        call_pipe(&self.pipe, Bytes::from(line), &self.options).await?;
        Ok(())
    }
}

fn current_module_name() -> String {
    std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map_or_else(
            || "unknown".to_owned(),
            |name| name.to_string_lossy().into_owned(),
        )
}
