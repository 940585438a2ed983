//! Length-prefixed frame codec for the engine's stdio.
//!
//! Wire format, identical in both directions:
//!
//! ```text
//! [u32 payload length, little-endian][payload bytes]
//! ```
//!
//! The payload is opaque here; only its length is inspected.
//! Works over any AsyncRead/AsyncWrite (pipes, sockets, etc).

use std::io;

use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Default upper bound for a single payload (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Codec that frames opaque payloads with a little-endian u32 length prefix.
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Frames longer than `max` are rejected on both encode and decode.
    pub fn with_max_frame_len(max: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(HEADER_LEN)
                .little_endian()
                .max_frame_length(max)
                .new_codec(),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.inner.max_frame_length()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.inner.decode(src)?.map(BytesMut::freeze))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        tracing::trace!(payload_len = payload.len(), "Encoding frame");
        self.inner.encode(payload, dst)
    }
}
