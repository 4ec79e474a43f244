//! Length-delimited message codec for the debug channel.
//!
//! Wraps [`tokio_util::codec::LengthDelimitedCodec`] with a configurable
//! maximum frame length. Each frame is one complete message: a 4-byte
//! big-endian length followed by the body. This gives the local socket the
//! message-mode semantics of a Windows message pipe.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec, LengthDelimitedCodecError};

use crate::{AppError, Result};

/// Message codec for both directions of the debug channel.
///
/// # Decoder
///
/// Buffers until a whole frame has arrived. Frames longer than the
/// configured maximum return [`AppError::Frame`] rather than allocating.
///
/// # Encoder
///
/// Bodies longer than the maximum are rejected with [`AppError::Frame`]
/// before anything is written to the buffer.
#[derive(Debug)]
pub struct MessageCodec {
    inner: LengthDelimitedCodec,
    max_bytes: usize,
}

impl MessageCodec {
    /// Create a codec that accepts messages of at most `max_bytes`.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .max_frame_length(max_bytes)
            .new_codec();
        Self { inner, max_bytes }
    }

    /// Largest body this codec accepts.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl Decoder for MessageCodec {
    type Item = Bytes;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.inner
            .decode(src)
            .map(|frame| frame.map(BytesMut::freeze))
            .map_err(|err| map_codec_error(&err, self.max_bytes))
    }
}

impl Encoder<Bytes> for MessageCodec {
    type Error = AppError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        check_message_len(item.len(), self.max_bytes)?;
        self.inner
            .encode(item, dst)
            .map_err(|err| map_codec_error(&err, self.max_bytes))
    }
}

/// Reject a body of `len` bytes when it exceeds `max_bytes`.
///
/// # Errors
///
/// Returns `AppError::Frame` naming both sizes.
pub fn check_message_len(len: usize, max_bytes: usize) -> Result<()> {
    if len > max_bytes {
        return Err(AppError::Frame(format!(
            "message too large: {len} bytes exceeds {max_bytes}"
        )));
    }
    Ok(())
}

fn map_codec_error(err: &std::io::Error, max_bytes: usize) -> AppError {
    let oversize = err
        .get_ref()
        .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>());
    if oversize {
        AppError::Frame(format!("message too large: frame exceeds {max_bytes} bytes"))
    } else {
        AppError::Io(err.to_string())
    }
}
