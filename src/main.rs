#![forbid(unsafe_code)]

//! `debug-server`: prints messages sent over the debug pipe.
//!
//! Owns the well-known channel, serves one client at a time and writes each
//! message to stdout. Runs until Ctrl-C or SIGTERM.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use debug_pipe::cli::{resolve_config, ServerCli};
use debug_pipe::ipc::server::DebugServer;
use debug_pipe::logging::init_tracing;
use debug_pipe::{AppError, Result};

fn main() -> Result<()> {
    let args = ServerCli::parse();
    init_tracing(args.log_format, "info")?;
    info!("debug-server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: ServerCli) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), args.pipe_name.as_deref())?;

    // Channel creation failure is fatal.
    let server = DebugServer::bind(&config).map_err(|err| {
        error!(%err, "failed to start debug server");
        err
    })?;

    let ct = CancellationToken::new();
    let serve_ct = ct.clone();
    let mut serve_handle =
        tokio::spawn(async move { server.serve(tokio::io::stdout(), serve_ct).await });

    // The loop only ends early if stdout goes away.
    let early = tokio::select! {
        () = shutdown_signal() => None,
        finished = &mut serve_handle => Some(finished),
    };
    let finished = match early {
        Some(finished) => finished,
        None => {
            info!("shutdown signal received");
            ct.cancel();
            serve_handle.await
        }
    };

    let summary =
        finished.map_err(|err| AppError::Io(format!("server task failed: {err}")))??;
    info!(messages = summary.messages, "debug-server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
