//! Bridge configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::codec::DEFAULT_MAX_FRAME_LEN;
use crate::locate::{BinaryLocator, engine_binary_name};
use crate::spawner::{EngineLaunch, EngineSpawner, PipedSpawner};

/// Explicit engine path, bypassing discovery.
pub const ENGINE_PATH_VAR: &str = "HIBIKI_ENGINE_PATH";

pub const SHUTDOWN_TIMEOUT_VAR: &str = "HIBIKI_SHUTDOWN_TIMEOUT_MS";

/// How long `stop()` waits after the graceful signal before killing.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct BridgeConfig {
    pub binary_name: String,
    /// Skips discovery when set.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub shutdown_timeout: Duration,
    pub max_frame_len: usize,
    pub locator: BinaryLocator,
    pub spawner: Arc<dyn EngineSpawner>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(engine_binary_name())
    }
}

impl BridgeConfig {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            program: None,
            args: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            locator: BinaryLocator::from_env(),
            spawner: Arc::new(PipedSpawner),
        }
    }

    /// Default configuration with [`ENGINE_PATH_VAR`] and
    /// [`SHUTDOWN_TIMEOUT_VAR`] applied.
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENGINE_PATH_VAR).filter(|p| !p.is_empty()) {
            self.program = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(SHUTDOWN_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.shutdown_timeout = Duration::from_millis(ms),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Ignoring invalid {}", SHUTDOWN_TIMEOUT_VAR);
                }
            }
        }
        self
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }

    pub fn with_locator(mut self, locator: BinaryLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn EngineSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Program and args for the next launch.
    ///
    /// Falls back to `./<binary_name>` when discovery finds nothing; the
    /// launch is still attempted and fails at the OS level if truly absent.
    pub fn resolve_launch(&self) -> EngineLaunch {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => self.locator.locate(&self.binary_name).unwrap_or_else(|| {
                let fallback = Path::new(".").join(&self.binary_name);
                tracing::warn!(
                    binary = %self.binary_name,
                    fallback = %fallback.display(),
                    "Engine binary not found, falling back to default path"
                );
                fallback
            }),
        };
        EngineLaunch::new(program).with_args(self.args.iter().cloned())
    }
}
