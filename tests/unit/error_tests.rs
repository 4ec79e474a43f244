//! Unit tests for `AppError` display format and conversions.

use debug_pipe::AppError;

#[test]
fn every_variant_has_its_own_prefix() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Ipc("bad".into()), "ipc: bad"),
        (AppError::Frame("bad".into()), "frame: bad"),
        (AppError::Timeout("bad".into()), "timeout: bad"),
        (AppError::Io("bad".into()), "io: bad"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "the pipe is being closed");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("being closed")));
}

#[test]
fn toml_error_converts_to_config_variant() {
    let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
    let err = AppError::from(toml_err);
    assert!(err.to_string().starts_with("config: invalid config:"));
}

#[test]
fn error_implements_std_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Timeout("wait".into()));
    assert_eq!(err.to_string(), "timeout: wait");
}
