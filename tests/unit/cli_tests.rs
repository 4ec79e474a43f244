//! Unit tests for the client and server command lines.

use std::ffi::OsString;
use std::io::Write as _;

use clap::Parser as _;

use debug_pipe::cli::{
    client_config_from_env, resolve_config, usage_line, ClientArgs, ServerCli, CONFIG_ENV,
    PIPE_NAME_ENV,
};
use debug_pipe::config::PipeConfig;
use debug_pipe::logging::LogFormat;
use debug_pipe::AppError;

fn argv(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

#[test]
fn client_accepts_exactly_one_message() {
    let args = ClientArgs::from_args_os(argv(&["debug-client", "hello world"]))
        .expect("one argument");
    assert_eq!(args.program, "debug-client");
    assert_eq!(args.message, "hello world");
}

#[test]
fn client_without_message_is_a_usage_error() {
    let err = ClientArgs::from_args_os(argv(&["/usr/bin/debug-client"]))
        .expect_err("missing message");
    assert_eq!(err.usage(), "Usage: /usr/bin/debug-client message");
}

#[test]
fn client_with_two_messages_is_a_usage_error() {
    let err = ClientArgs::from_args_os(argv(&["debug-client", "one", "two"]))
        .expect_err("extra message");
    assert_eq!(err.program, "debug-client");
}

#[test]
fn flag_like_option_plus_message_is_a_usage_error() {
    let result = ClientArgs::from_args_os(argv(&["debug-client", "hello", "--pipe-name", "X"]));
    assert!(result.is_err(), "three arguments must never send");
}

#[test]
fn flag_like_single_arguments_are_messages() {
    for text in ["--version", "-V", "--help", "-h", "--pipe-name=zz", "--", "-x marks the spot"] {
        let args = ClientArgs::from_args_os(argv(&["debug-client", text]))
            .expect("any single argument is a message");
        assert_eq!(args.message, text);
    }
}

#[test]
fn empty_argv_falls_back_to_binary_name() {
    let err = ClientArgs::from_args_os(Vec::<OsString>::new()).expect_err("no message");
    assert_eq!(err.usage(), "Usage: debug-client message");
}

#[cfg(unix)]
#[test]
fn non_utf8_program_name_is_decoded_lossily() {
    use std::os::unix::ffi::OsStringExt as _;

    let program = OsString::from_vec(vec![b'd', b'c', 0xff]);
    let args = ClientArgs::from_args_os(vec![program, OsString::from("hi")])
        .expect("one argument");
    assert_eq!(args.program, "dc\u{fffd}");
}

#[test]
fn client_config_reads_pipe_name_from_environment() {
    let config = client_config_from_env(|key| {
        (key == PIPE_NAME_ENV).then(|| OsString::from("AgentTrace"))
    })
    .expect("valid override");
    assert_eq!(config.pipe_name, "AgentTrace");
}

#[test]
fn client_config_reads_file_named_in_environment() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"pipe_name = \"FromFile\"\nwait_seconds = 2\n")
        .expect("write config");
    let path = file.path().as_os_str().to_owned();

    let config = client_config_from_env(|key| (key == CONFIG_ENV).then(|| path.clone()))
        .expect("config loads");
    assert_eq!(config.pipe_name, "FromFile");
    assert_eq!(config.wait_seconds, 2);
}

#[test]
fn client_config_defaults_without_environment() {
    let config = client_config_from_env(|_| None).expect("defaults");
    assert_eq!(config, PipeConfig::default());
}

#[test]
fn usage_line_names_the_program() {
    assert_eq!(usage_line("DebugClient.py"), "Usage: DebugClient.py message");
}

#[test]
fn server_runs_without_arguments() {
    let args = ServerCli::try_parse_from(["debug-server"]).expect("no arguments needed");
    assert_eq!(args.log_format, LogFormat::Text);
    assert!(args.config.is_none());
}

#[test]
fn server_accepts_json_logs() {
    let args = ServerCli::try_parse_from(["debug-server", "--log-format", "json"])
        .expect("json is a valid format");
    assert_eq!(args.log_format, LogFormat::Json);
}

#[test]
fn resolve_config_applies_pipe_name_override() {
    let config = resolve_config(None, Some("AgentTrace")).expect("valid override");
    assert_eq!(config.pipe_name, "AgentTrace");
    assert_eq!(config.max_message_bytes, 4096);
}

#[test]
fn resolve_config_rejects_invalid_override() {
    let result = resolve_config(None, Some(""));
    assert!(matches!(result, Err(AppError::Config(_))));
}
