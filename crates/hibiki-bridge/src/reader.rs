//! Background readers for the engine's output streams.
//!
//! - **Inbound reader** (stdout): frames -> schema decode -> subscriber fan-out.
//! - **Diagnostic reader** (stderr): text lines -> tracing.
//!
//! Both block on their stream until it closes; closing the stream (engine
//! exit) or aborting the task is the only cancellation path.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::codec::FramedRead;

use crate::bridge::codec::FrameCodec;
use crate::bridge::schema::MessageSchema;
use crate::error::SchemaError;
use crate::subscribers::SubscriberRegistry;

/// Tracing target for forwarded engine stderr.
pub const DIAGNOSTIC_TARGET: &str = "hibiki::engine";

/// Prefix on every forwarded engine stderr line.
pub const DIAGNOSTIC_PREFIX: &str = "[Backend]";

/// Why the inbound reader stopped. Every variant is terminal for the link.
#[derive(Debug)]
pub enum LinkDown {
    /// Engine closed its stdout on a frame boundary.
    Closed,
    /// I/O error, oversized header or short read.
    Frame(std::io::Error),
    /// The payload did not decode.
    Malformed(SchemaError),
}

pub async fn run_inbound<R, S>(
    mut frames: FramedRead<R, FrameCodec>,
    schema: Arc<S>,
    subscribers: Arc<SubscriberRegistry<S::Notification>>,
) -> LinkDown
where
    R: AsyncRead + Unpin,
    S: MessageSchema,
{
    let mut received: u64 = 0;

    let reason = loop {
        match frames.next().await {
            Some(Ok(payload)) => {
                received += 1;
                let notification = match schema.decode(&payload) {
                    Ok(n) => n,
                    Err(e) => break LinkDown::Malformed(e),
                };
                tracing::trace!(payload_len = payload.len(), "Dispatching notification");
                subscribers.dispatch(&notification);
            }
            Some(Err(e)) => break LinkDown::Frame(e),
            None => break LinkDown::Closed,
        }
    };

    match &reason {
        LinkDown::Closed => tracing::info!(received, "Engine output closed"),
        LinkDown::Frame(e) => {
            tracing::error!(received, error = %e, "Engine link down: framing error")
        }
        LinkDown::Malformed(e) => {
            tracing::error!(received, error = %e, "Engine link down: malformed notification")
        }
    }
    reason
}

/// Forward each stderr line to the log. Returns the number of lines forwarded.
pub async fn run_diagnostics<R>(stream: R) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::info!(target: DIAGNOSTIC_TARGET, "{} {}", DIAGNOSTIC_PREFIX, line);
                forwarded += 1;
            }
            Ok(None) => {
                tracing::debug!(forwarded, "Engine stderr closed");
                break;
            }
            Err(e) => {
                tracing::warn!(forwarded, error = %e, "Engine stderr reader failed");
                break;
            }
        }
    }
    forwarded
}
