//! Engine bridge - owns the engine process and both directions of its link.
//!
//! Flow:
//! 1. `start()` resolves the binary, spawns it with piped stdio
//! 2. Inbound reader (stdout) and diagnostic reader (stderr) run as tasks
//! 3. `send()` frames requests onto stdin, one frame per call, under a lock
//! 4. `stop()` signals, waits, escalates to kill, then reaps both readers
//!
//! Nothing here reports failure to the caller of `start`/`send`.
//! Launch, link and write failures are logged; delivery confirmation comes
//! back asynchronously as an acknowledge notification.
//!
//! An engine whose inbound link went down (closed stdout, framing error,
//! undecodable payload) counts as not running even if its process is still
//! alive; the next `start()` terminates it and launches a fresh one.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::FrameCodec;
use crate::bridge::protocol::Request;
use crate::bridge::schema::{JsonSchema, MessageSchema};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, SpawnError};
use crate::reader::{LinkDown, run_diagnostics, run_inbound};
use crate::spawner::EngineLaunch;
use crate::subscribers::{ListenerId, SubscriberRegistry};

/// How long readers may keep draining after the engine is gone.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type FrameWriter = FramedWrite<ChildStdin, FrameCodec>;

struct EngineProcess {
    child: Child,
    pid: Option<u32>,
    inbound: JoinHandle<LinkDown>,
    diagnostics: JoinHandle<usize>,
}

impl EngineProcess {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn link_up(&self) -> bool {
        !self.inbound.is_finished()
    }

    /// Alive and still delivering notifications.
    fn is_usable(&mut self) -> bool {
        self.link_up() && self.is_alive()
    }

    /// Let both readers drain to EOF, abort whatever is still blocked.
    async fn reap_readers(&mut self) -> (ReaderEnd<LinkDown>, ReaderEnd<usize>) {
        let inbound = reap_reader(&mut self.inbound, "inbound").await;
        let diagnostics = reap_reader(&mut self.diagnostics, "diagnostic").await;
        (inbound, diagnostics)
    }

    /// Terminate the process if needed, then reap both readers.
    async fn shut_down(mut self, timeout: Duration) -> EngineExit {
        let status = match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(%status, "Engine had already exited");
                Some(status)
            }
            _ => terminate(&mut self.child, timeout).await,
        };
        let (inbound, diagnostics) = self.reap_readers().await;
        EngineExit {
            status,
            inbound,
            diagnostics,
        }
    }
}

async fn reap_reader<T: std::fmt::Debug>(
    handle: &mut JoinHandle<T>,
    reader: &'static str,
) -> ReaderEnd<T> {
    match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut *handle).await {
        Ok(Ok(value)) => {
            tracing::debug!(reader, ?value, "Reader finished");
            ReaderEnd::Finished(value)
        }
        Ok(Err(e)) => {
            tracing::warn!(reader, error = %e, "Reader task failed");
            ReaderEnd::Failed
        }
        Err(_) => {
            handle.abort();
            let _ = (&mut *handle).await;
            tracing::debug!(reader, "Reader aborted after drain timeout");
            ReaderEnd::Aborted
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        // The child itself is killed on drop by the spawner.
        self.inbound.abort();
        self.diagnostics.abort();
    }
}

/// How a background reader ended. Every variant means the task is gone.
#[derive(Debug)]
pub enum ReaderEnd<T> {
    /// Ran to the end of its stream.
    Finished(T),
    /// Still blocked after the drain timeout, typically because a
    /// grandchild holds the pipe open.
    Aborted,
    /// The task panicked.
    Failed,
}

/// What `stop()` reaped.
#[derive(Debug)]
pub struct EngineExit {
    /// `None` if the process could not be waited on.
    pub status: Option<ExitStatus>,
    pub inbound: ReaderEnd<LinkDown>,
    /// Number of stderr lines forwarded when finished.
    pub diagnostics: ReaderEnd<usize>,
}

/// Bridge between the control surface and one engine process.
///
/// Construct once per application run and share it (`Arc<EngineBridge>`);
/// every method takes `&self`. Dropping the bridge kills the engine.
pub struct EngineBridge<S: MessageSchema = JsonSchema> {
    config: BridgeConfig,
    schema: Arc<S>,
    subscribers: Arc<SubscriberRegistry<S::Notification>>,
    // Lock order: process before writer.
    process: Mutex<Option<EngineProcess>>,
    writer: Mutex<Option<FrameWriter>>,
}

impl EngineBridge<JsonSchema> {
    /// Bridge speaking [`JsonSchema`] payloads.
    ///
    /// JSON is a stand-in codec for tests and JSON-speaking engines; the
    /// stock `hbk-play` expects its native schema, so pair it with a
    /// [`MessageSchema`] for that encoding through [`EngineBridge::with_schema`].
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_schema(config, JsonSchema)
    }

    /// Encode and send a typed request. Failures are logged.
    pub async fn send_request(&self, request: &Request) {
        match JsonSchema::encode_request(request) {
            Ok(payload) => self.send(payload).await,
            Err(e) => {
                tracing::error!(command = request.command_type(), error = %e, "Failed to encode request")
            }
        }
    }
}

impl<S: MessageSchema> EngineBridge<S> {
    pub fn with_schema(config: BridgeConfig, schema: S) -> Self {
        Self {
            config,
            schema: Arc::new(schema),
            subscribers: Arc::new(SubscriberRegistry::new()),
            process: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a listener for every inbound notification.
    ///
    /// Safe before `start()`. Listeners run on the inbound reader task and
    /// must not block.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&S::Notification) + Send + Sync + 'static,
    {
        self.subscribers.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.subscribers.remove(id)
    }

    /// Launch the engine.
    ///
    /// No-op while an engine is running. If the previous engine has exited
    /// or its inbound link is down, it is terminated and reaped, and a fresh
    /// one is launched. Launch failures are logged and leave the bridge
    /// without a process.
    pub async fn start(&self) {
        let mut process = self.process.lock().await;

        if let Some(existing) = process.as_mut() {
            if existing.is_usable() {
                tracing::warn!(pid = ?existing.pid, "Engine already running, ignoring start");
                return;
            }
            if existing.is_alive() {
                tracing::warn!(pid = ?existing.pid, "Engine link is down, restarting engine");
            } else {
                tracing::info!(pid = ?existing.pid, "Previous engine has exited, restarting");
            }
            self.writer.lock().await.take();
            if let Some(stale) = process.take() {
                stale.shut_down(self.config.shutdown_timeout).await;
            }
        }

        let launch = self.config.resolve_launch();
        match self.launch(&launch) {
            Ok((engine, writer)) => {
                tracing::info!(
                    pid = ?engine.pid,
                    path = %launch.program.display(),
                    "Engine started"
                );
                *self.writer.lock().await = Some(writer);
                *process = Some(engine);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to start engine");
            }
        }
    }

    fn launch(&self, launch: &EngineLaunch) -> Result<(EngineProcess, FrameWriter), SpawnError> {
        let mut child = self.config.spawner.spawn(launch)?;

        let stdin = child
            .stdin
            .take()
            .ok_or(SpawnError::StreamNotCaptured("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SpawnError::StreamNotCaptured("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SpawnError::StreamNotCaptured("stderr"))?;

        let max = self.config.max_frame_len;
        let frames = FramedRead::new(stdout, FrameCodec::with_max_frame_len(max));
        let inbound = tokio::spawn(run_inbound(
            frames,
            Arc::clone(&self.schema),
            Arc::clone(&self.subscribers),
        ));
        let diagnostics = tokio::spawn(run_diagnostics(stderr));

        let writer = FramedWrite::new(stdin, FrameCodec::with_max_frame_len(max));
        let engine = EngineProcess {
            pid: child.id(),
            child,
            inbound,
            diagnostics,
        };
        Ok((engine, writer))
    }

    /// Stop the engine: graceful signal, wait up to the shutdown timeout,
    /// then kill. Both readers have terminated when this returns.
    ///
    /// The engine is detached from the bridge before the wait, so liveness
    /// queries answer immediately while a stop is in flight, and a `start()`
    /// issued meanwhile launches a fresh engine. Idempotent: returns `None`
    /// if no engine was attached.
    pub async fn stop(&self) -> Option<EngineExit> {
        let engine = {
            let mut process = self.process.lock().await;
            self.writer.lock().await.take();
            process.take()
        };
        let Some(engine) = engine else {
            tracing::debug!("Stop requested but no engine is running");
            return None;
        };
        Some(engine.shut_down(self.config.shutdown_timeout).await)
    }

    /// False once the engine has exited or its inbound link is down.
    pub async fn is_running(&self) -> bool {
        match self.process.lock().await.as_mut() {
            Some(engine) => engine.is_usable(),
            None => false,
        }
    }

    /// Pid of the attached engine, including one whose link is down.
    pub async fn pid(&self) -> Option<u32> {
        self.process.lock().await.as_ref().and_then(|e| e.pid)
    }

    /// Write one frame. Never fails from the caller's point of view.
    pub async fn send(&self, payload: impl Into<Bytes>) {
        match self.try_send(payload).await {
            Ok(()) => {}
            Err(BridgeError::NotRunning) => {
                tracing::warn!("Dropping request: engine is not running");
            }
            Err(e) => tracing::error!(error = %e, "Failed to send request"),
        }
    }

    /// Write one frame, reporting local failures.
    ///
    /// Header, payload and flush happen under one lock, so concurrent
    /// callers never interleave bytes on the wire. Success only means the
    /// bytes reached the pipe.
    pub async fn try_send(&self, payload: impl Into<Bytes>) -> Result<(), BridgeError> {
        let payload = payload.into();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BridgeError::NotRunning)?;

        let payload_len = payload.len();
        match writer.send(payload).await {
            Ok(()) => {
                tracing::trace!(payload_len, "Frame sent");
                Ok(())
            }
            // Rejected before any byte was written; the stream is still aligned.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Err(BridgeError::Write(e)),
            Err(e) => {
                tracing::warn!(error = %e, "Engine input broken, closing it");
                guard.take();
                Err(BridgeError::Write(e))
            }
        }
    }
}

async fn terminate(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    tracing::info!(pid = ?child.id(), "Stopping engine");
    request_graceful_exit(child);

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(%status, "Engine exited");
            return Some(status);
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed waiting for engine, killing it");
        }
        Err(_) => {
            tracing::warn!(?timeout, "Engine did not exit in time, killing it");
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::error!(error = %e, "Failed to kill engine");
    }
    match child.wait().await {
        Ok(status) => {
            tracing::info!(%status, "Engine killed");
            Some(status)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reap engine");
            None
        }
    }
}

#[cfg(unix)]
fn request_graceful_exit(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::warn!(pid, error = %e, "Failed to send SIGTERM to engine");
    }
}

#[cfg(not(unix))]
fn request_graceful_exit(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to request engine exit");
    }
}
