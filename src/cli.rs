//! Command-line surfaces of `debug-server` and `debug-client`.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::config::PipeConfig;
use crate::logging::LogFormat;
use crate::Result;

/// `debug-server` arguments. All optional; a bare invocation serves the
/// default channel.
#[derive(Debug, Parser)]
#[command(
    name = "debug-server",
    about = "Print messages sent over the debug pipe",
    version,
    long_about = None
)]
pub struct ServerCli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the channel name.
    #[arg(long)]
    pub pipe_name: Option<String>,

    /// Diagnostic log format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Environment variable naming a TOML config file for `debug-client`.
pub const CONFIG_ENV: &str = "DEBUG_PIPE_CONFIG";

/// Environment variable overriding the channel name for `debug-client`.
pub const PIPE_NAME_ENV: &str = "DEBUG_PIPE_NAME";

/// `debug-client` arguments: the program path and exactly one message.
///
/// Parsed by hand rather than with clap: any single argument is the
/// message, including `--help` or `--version`, and anything else is a
/// usage error. Overrides come from [`CONFIG_ENV`] and [`PIPE_NAME_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientArgs {
    /// `argv[0]` as invoked, lossily decoded.
    pub program: String,
    /// Free text to log.
    pub message: String,
}

/// Arity mismatch on the `debug-client` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    /// `argv[0]` as invoked, lossily decoded.
    pub program: String,
}

impl UsageError {
    /// The line to print before exiting with status 1.
    #[must_use]
    pub fn usage(&self) -> String {
        usage_line(&self.program)
    }
}

impl ClientArgs {
    /// Split a raw argument vector, `argv[0]` included.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError`] unless exactly one argument follows `argv[0]`.
    pub fn from_args_os<I>(args: I) -> std::result::Result<Self, UsageError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = args.into_iter();
        let program = args
            .next()
            .map_or_else(|| "debug-client".to_owned(), lossy);

        match (args.next(), args.next()) {
            (Some(message), None) => Ok(Self {
                program,
                message: lossy(message),
            }),
            _ => Err(UsageError { program }),
        }
    }
}

fn lossy(arg: OsString) -> String {
    arg.to_string_lossy().into_owned()
}

/// The line printed when `debug-client` gets the wrong arguments.
#[must_use]
pub fn usage_line(program: &str) -> String {
    format!("Usage: {program} message")
}

/// Load the optional config file and apply a pipe-name override.
///
/// # Errors
///
/// Returns `AppError::Config` if the file cannot be loaded or the merged
/// configuration is invalid.
pub fn resolve_config(
    config: Option<&std::path::Path>,
    pipe_name: Option<&str>,
) -> Result<PipeConfig> {
    let mut resolved = match config {
        Some(path) => PipeConfig::load_from_path(path)?,
        None => PipeConfig::default(),
    };
    if let Some(name) = pipe_name {
        name.clone_into(&mut resolved.pipe_name);
    }
    resolved.validate()?;
    Ok(resolved)
}

/// Resolve `debug-client` configuration from the environment.
///
/// `lookup` is consulted for [`CONFIG_ENV`] and [`PIPE_NAME_ENV`]; pass
/// `|key| std::env::var_os(key)` in the binary.
///
/// # Errors
///
/// Returns `AppError::Config` if the named file cannot be loaded or the
/// merged configuration is invalid.
pub fn client_config_from_env<F>(lookup: F) -> Result<PipeConfig>
where
    F: Fn(&str) -> Option<OsString>,
{
    let config = lookup(CONFIG_ENV).map(PathBuf::from);
    let pipe_name = lookup(PIPE_NAME_ENV).map(lossy);
    resolve_config(config.as_deref(), pipe_name.as_deref())
}
