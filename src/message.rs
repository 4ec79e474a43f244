//! Log-line formatting for messages sent to the debug server.
//!
//! Two line shapes exist:
//!
//! - script lines, produced by `debug-client`:
//!   `[12345.678 /usr/bin/debug-client]: hello`
//! - native lines, produced by [`crate::trace::Tracer`]:
//!   `[01234.567 agent.exe,p0042,t0001]: starting`
//!
//! Both carry the wall-clock time as seconds modulo 100000 plus milliseconds.

use chrono::Utc;

/// Longest trace line a [`crate::trace::Tracer`] sends, in bytes.
pub const TRACE_LINE_LIMIT: usize = 1023;

/// Seconds wrap at this value so stamps stay five digits wide.
const STAMP_WRAP_SECONDS: i64 = 100_000;

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Time of day as printed in a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Seconds since the epoch, modulo 100000.
    pub seconds: u32,
    /// Milliseconds within the second.
    pub millis: u16,
}

impl Stamp {
    /// Build a stamp from milliseconds since the Unix epoch.
    #[must_use]
    pub fn from_epoch_millis(millis: i64) -> Self {
        let wrapped = millis.rem_euclid(STAMP_WRAP_SECONDS * 1000);
        Self {
            seconds: u32::try_from(wrapped / 1000).unwrap_or(0),
            millis: u16::try_from(wrapped % 1000).unwrap_or(0),
        }
    }

    /// Read `clock` now.
    #[must_use]
    pub fn now(clock: &dyn Clock) -> Self {
        Self::from_epoch_millis(clock.now_millis())
    }
}

/// `[<secs>.<mmm> <program>]: <text>`.
#[must_use]
pub fn script_line(stamp: Stamp, program: &str, text: &str) -> String {
    format!(
        "[{}.{:03} {program}]: {text}",
        stamp.seconds, stamp.millis
    )
}

/// `[<secs:05>.<mmm> <module>,p<pid:04>,t<tid:04>]: <text>`.
#[must_use]
pub fn native_line(stamp: Stamp, module: &str, pid: u32, tid: u64, text: &str) -> String {
    format!(
        "[{:05}.{:03} {module},p{pid:04},t{tid:04}]: {text}",
        stamp.seconds, stamp.millis
    )
}

/// Cut `text` to at most `limit` bytes without splitting a character.
#[must_use]
pub fn truncate_to(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
