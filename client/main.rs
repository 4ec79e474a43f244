#![forbid(unsafe_code)]

//! `debug-client`: send one line to the debug server.
//!
//! Usage: `debug-client <message>`. Exactly one argument, sent verbatim
//! whatever it looks like. Formats `[<seconds>.<millis> <argv0>]: <message>`,
//! waits for the server as configured (forever by default), sends the line
//! and exits once the server has replied or hung up.
//!
//! `DEBUG_PIPE_CONFIG` names a TOML config file and `DEBUG_PIPE_NAME`
//! overrides the channel name.

use bytes::Bytes;

use debug_pipe::cli::{client_config_from_env, ClientArgs};
use debug_pipe::ipc::client::call_pipe;
use debug_pipe::ipc::PipeName;
use debug_pipe::logging::{init_tracing, LogFormat};
use debug_pipe::message::{script_line, Stamp, SystemClock};
use debug_pipe::{AppError, Result};

fn main() {
    let args = match ClientArgs::from_args_os(std::env::args_os()) {
        Ok(args) => args,
        Err(usage) => {
            println!("{}", usage.usage());
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(LogFormat::Text, "warn") {
        eprintln!("{err}");
    }

    if let Err(err) = run(&args) {
        eprintln!("Failed to send to debug server: {err}");
        std::process::exit(1);
    }
}

fn run(args: &ClientArgs) -> Result<()> {
    let config = client_config_from_env(|key| std::env::var_os(key))?;
    let pipe = PipeName::new(config.pipe_name.clone())?;
    let line = script_line(Stamp::now(&SystemClock), &args.program, &args.message);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(call_pipe(&pipe, Bytes::from(line), &config.call_options()))?;

    Ok(())
}
