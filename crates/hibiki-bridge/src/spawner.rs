//! Engine launch strategies.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::SpawnError;

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLaunch {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EngineLaunch {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Extension point for different engine spawn strategies.
///
/// Implementations must pipe all three standard streams.
pub trait EngineSpawner: Send + Sync {
    fn spawn(&self, launch: &EngineLaunch) -> Result<Child, SpawnError>;
}

/// Spawns the engine directly with piped stdio.
///
/// The child is killed if its handle is dropped, so an engine can never
/// outlive the bridge that owns it.
pub struct PipedSpawner;

impl EngineSpawner for PipedSpawner {
    fn spawn(&self, launch: &EngineLaunch) -> Result<Child, SpawnError> {
        Command::new(&launch.program)
            .args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                path: launch.program.clone(),
                source,
            })
    }
}
