use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hibiki_bridge::{
    BridgeConfig, EngineBridge, Notification, Request, discovery, install_shutdown_hook,
};

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    /// Drive the engine: requests as JSON lines on stdin, notifications to the log.
    /// Frames carry JSON payloads, so the engine must speak JSON too.
    Run,
    /// Print the plugins in a bundle.
    List(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: Mode,
    engine: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: hbk-bridge [--engine <path>] [--list <bundle>]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --engine <path>  Engine binary [default: discovered hbk-play]");
            eprintln!("  --list <bundle>  Print the plugins in a bundle as index:name and exit");
            eprintln!();
            eprintln!("Without --list, each stdin line is a JSON request, e.g. {{\"type\":\"play\"}}");
            eprintln!("Payloads are sent as JSON; the engine must accept JSON-encoded frames.");
            process::exit(2);
        }
    };

    init_tracing();

    match run(args).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut engine: Option<PathBuf> = None;
    let mut list: Option<PathBuf> = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--engine" => {
                i += 1;
                engine = Some(PathBuf::from(
                    args.get(i).ok_or("--engine requires a value")?,
                ));
            }
            "--list" => {
                i += 1;
                list = Some(PathBuf::from(args.get(i).ok_or("--list requires a value")?));
            }
            "--help" | "-h" => return Err("".to_string()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    let mode = match list {
        Some(bundle) => Mode::List(bundle),
        None => Mode::Run,
    };
    Ok(Args { mode, engine })
}

/// Initialize tracing with HIBIKI_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("HIBIKI_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!(
            "hibiki_bridge={level},hbk_bridge={level},hibiki::engine={level}"
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

/// Returns the process exit code.
async fn run(args: Args) -> anyhow::Result<i32> {
    let mut config = BridgeConfig::from_env();
    if let Some(engine) = args.engine {
        config = config.with_program(engine);
    }

    match args.mode {
        Mode::List(bundle) => {
            let engine = config.resolve_launch().program;
            let plugins = discovery::list_plugins(&engine, &bundle)
                .await
                .with_context(|| format!("listing plugins in {}", bundle.display()))?;
            for plugin in plugins {
                println!("{}:{}", plugin.index, plugin.name);
            }
            Ok(0)
        }
        Mode::Run => serve(config).await,
    }
}

async fn serve(config: BridgeConfig) -> anyhow::Result<i32> {
    let bridge = Arc::new(EngineBridge::new(config));
    bridge.add_listener(log_notification);
    let hook = install_shutdown_hook(Arc::clone(&bridge));

    bridge.start().await;
    if !bridge.is_running().await {
        anyhow::bail!("engine failed to start");
    }

    match hook {
        Some(hook) => {
            tokio::select! {
                result = forward_stdin(&bridge) => result?,
                received = hook => {
                    // The hook has already stopped the engine.
                    let received = received.context("shutdown hook failed")?;
                    return Ok(received.exit_code());
                }
            }
        }
        None => forward_stdin(&bridge).await?,
    }

    bridge.stop().await;
    Ok(0)
}

async fn forward_stdin(bridge: &EngineBridge) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!(command = request.command_type(), "Forwarding request");
                bridge.send_request(&request).await;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid request line"),
        }
    }
    tracing::info!("stdin closed");
    Ok(())
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::Acknowledge {
            command_type,
            success,
        } => tracing::info!(%command_type, success, "Acknowledged"),
        Notification::ParamList {
            track_index,
            plugin_index,
            plugin_name,
            is_instrument,
            params,
        } => tracing::info!(
            track_index,
            plugin_index,
            %plugin_name,
            is_instrument,
            params = params.len(),
            "Plugin loaded"
        ),
        Notification::Log { message } => tracing::info!(target: "hibiki::engine", "{}", message),
        Notification::ClipInfo {
            track_index,
            slot_index,
            name,
        } => tracing::info!(track_index, slot_index, %name, "Clip loaded"),
        Notification::ClipWaveform {
            track_index,
            slot_index,
            peaks,
        } => tracing::debug!(track_index, slot_index, points = peaks.len(), "Clip waveform"),
        Notification::TrackLevels { levels } => {
            tracing::trace!(tracks = levels.len(), "Track levels")
        }
        Notification::ClearProject => tracing::info!("Project cleared"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("hbk-bridge")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_args_runs_with_discovered_engine() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(
            args,
            Args {
                mode: Mode::Run,
                engine: None
            }
        );
    }

    #[test]
    fn list_with_explicit_engine() {
        let args = parse_args(&argv(&["--engine", "./hbk-play", "--list", "Dexed.vst3"])).unwrap();
        assert_eq!(args.mode, Mode::List(PathBuf::from("Dexed.vst3")));
        assert_eq!(args.engine, Some(PathBuf::from("./hbk-play")));
    }

    #[test]
    fn missing_value_is_an_error() {
        assert_eq!(
            parse_args(&argv(&["--list"])).unwrap_err(),
            "--list requires a value"
        );
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_args(&argv(&["--verbose"])).is_err());
        assert!(parse_args(&argv(&["stray"])).is_err());
    }
}
