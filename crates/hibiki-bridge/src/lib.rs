//! hibiki-bridge: process bridge to the hbk-play audio engine.
//!
//! The engine runs as a child process. This crate launches it, speaks the
//! length-prefixed binary protocol over its stdin/stdout, forwards its
//! stderr to the log and fans inbound notifications out to listeners.
//!
//! ```ignore
//! use std::sync::Arc;
//! use hibiki_bridge::{BridgeConfig, EngineBridge, Notification, Request};
//!
//! let bridge = Arc::new(EngineBridge::new(BridgeConfig::from_env()));
//! bridge.add_listener(|n: &Notification| {
//!     if let Notification::Acknowledge { command_type, success } = n {
//!         println!("{command_type}: {success}");
//!     }
//! });
//! bridge.start().await;
//! bridge.send_request(&Request::Play).await;
//! bridge.stop().await;
//! ```

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod locate;
pub mod reader;
pub mod shutdown;
pub mod spawner;
pub mod subscribers;

pub use bridge::codec::FrameCodec;
pub use bridge::protocol::{Notification, ParamInfo, Request, TrackLevel};
pub use bridge::schema::{JsonSchema, MessageSchema, RawSchema};
pub use config::BridgeConfig;
pub use discovery::{PluginEntry, list_plugins};
pub use engine::{EngineBridge, EngineExit, ReaderEnd};
pub use error::{BridgeError, SchemaError, SpawnError};
pub use locate::{BinaryLocator, engine_binary_name, resolve_binary_path};
pub use reader::LinkDown;
pub use shutdown::{HostSignal, install_shutdown_hook};
pub use spawner::{EngineLaunch, EngineSpawner, PipedSpawner};
pub use subscribers::{ListenerId, SubscriberRegistry};
