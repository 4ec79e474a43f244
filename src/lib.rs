#![forbid(unsafe_code)]

//! Out-of-process debug logging over a named duplex pipe.
//!
//! A long-lived `debug-server` prints every message it receives; short-lived
//! clients (`debug-client`, or a [`trace::Tracer`] inside another program)
//! connect, send one message, wait for the acknowledgment and disconnect.

pub mod cli;
pub mod config;
pub mod errors;
pub mod ipc;
pub mod logging;
pub mod message;
pub mod trace;

pub use config::PipeConfig;
pub use errors::{AppError, Result};
