//! Host shutdown hook.
//!
//! Installed once per process, at bootstrap. Cycling `start()`/`stop()` on
//! the bridge never registers another handler.
//!
//! Installing the hook takes over SIGINT and SIGTERM for the whole process:
//! the host no longer dies on them by default. The host must await the
//! returned handle and exit itself, typically with
//! [`HostSignal::exit_code`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::info;

use crate::bridge::schema::MessageSchema;
use crate::engine::EngineBridge;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// The signal that asked the host to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Interrupt,
    Terminate,
}

impl HostSignal {
    /// Conventional shell exit code for a process ended by this signal.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Interrupt => 130,
            Self::Terminate => 143,
        }
    }
}

/// Stop `bridge` when the host receives SIGINT or SIGTERM.
///
/// Handlers are registered before this returns. The hook task completes
/// with the received signal once the engine is stopped; the caller decides
/// when to exit. Returns `None` if a hook was already installed in this
/// process. Must be called within a tokio runtime.
pub fn install_shutdown_hook<S: MessageSchema>(
    bridge: Arc<EngineBridge<S>>,
) -> Option<JoinHandle<HostSignal>> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        tracing::debug!("Shutdown hook already installed");
        return None;
    }

    let mut signals = ShutdownSignals::register();
    Some(tokio::spawn(async move {
        let received = signals.recv().await;
        bridge.stop().await;
        info!(?received, "Engine stopped for host shutdown");
        received
    }))
}

/// SIGINT/SIGTERM listeners.
///
/// A handler that cannot be installed is logged and that signal is never
/// observed.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn register() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let interrupt = signal(SignalKind::interrupt())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGINT handler"))
            .ok();
        let terminate = signal(SignalKind::terminate())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGTERM handler"))
            .ok();
        Self {
            interrupt,
            terminate,
        }
    }

    #[cfg(not(unix))]
    fn register() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> HostSignal {
        let Self {
            interrupt,
            terminate,
        } = self;

        let interrupt = async move {
            match interrupt {
                Some(sig) => {
                    sig.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        let terminate = async move {
            match terminate {
                Some(sig) => {
                    sig.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = interrupt => {
                info!("Received SIGINT, stopping engine...");
                HostSignal::Interrupt
            }
            _ = terminate => {
                info!("Received SIGTERM, stopping engine...");
                HostSignal::Terminate
            }
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> HostSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, stopping engine...");
        HostSignal::Interrupt
    }
}
