//! Plugin discovery through the engine's `--list` mode.
//!
//! `<engine> --list <bundle>` prints one `index:name` line per plugin class
//! in the bundle and exits.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{BridgeError, Result};

pub const LIST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub index: u32,
    pub name: String,
}

/// Parse `index:name` lines. Lines without a colon or with a non-numeric
/// index are skipped; names may themselves contain colons.
pub fn parse_plugin_list(output: &str) -> Vec<PluginEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (index, name) = line.split_once(':')?;
            let index = index.trim().parse().ok()?;
            Some(PluginEntry {
                index,
                name: name.trim_end_matches('\r').to_string(),
            })
        })
        .collect()
}

pub async fn list_plugins(engine: &Path, bundle: &Path) -> Result<Vec<PluginEntry>> {
    list_plugins_with_timeout(engine, bundle, LIST_TIMEOUT).await
}

pub async fn list_plugins_with_timeout(
    engine: &Path,
    bundle: &Path,
    timeout: Duration,
) -> Result<Vec<PluginEntry>> {
    tracing::debug!(engine = %engine.display(), bundle = %bundle.display(), "Listing plugins");

    let output = Command::new(engine)
        .arg("--list")
        .arg(bundle)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| BridgeError::ListTimeout(timeout))?
        .map_err(BridgeError::ListIo)?;

    if !output.status.success() {
        return Err(BridgeError::ListFailed(output.status));
    }

    let plugins = parse_plugin_list(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!(count = plugins.len(), bundle = %bundle.display(), "Listed plugins");
    Ok(plugins)
}
