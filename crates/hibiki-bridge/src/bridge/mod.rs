//! Wire layer between the control surface and the engine process.
//!
//! # Architecture
//!
//! - **codec**: little-endian u32 length-prefixed framing for AsyncRead/AsyncWrite
//! - **protocol**: message types (Request, Notification)
//! - **schema**: payload decoding seam (JsonSchema, RawSchema)

pub mod codec;
pub mod protocol;
pub mod schema;
