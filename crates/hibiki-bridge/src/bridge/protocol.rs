//! Message types exchanged with the engine.
//!
//! Two directions over the same framing:
//! - **Requests** (stdin): commands from the control surface.
//! - **Notifications** (stdout): events from the engine, one closed variant per kind.

use serde::{Deserialize, Serialize};

/// Commands from the control surface to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    LoadPlugin {
        track_index: i32,
        plugin_index: i32,
        path: String,
    },

    RemovePlugin {
        track_index: i32,
        plugin_index: i32,
    },

    /// Open the plugin's own editor window.
    ShowPluginGui {
        track_index: i32,
        plugin_index: i32,
    },

    SetParamValue {
        track_index: i32,
        plugin_index: i32,
        param_id: u32,
        value: f32,
    },

    LoadClip {
        track_index: i32,
        slot_index: i32,
        path: String,
        is_loop: bool,
    },

    DeleteClip {
        track_index: i32,
        slot_index: i32,
    },

    SetClipLoop {
        track_index: i32,
        slot_index: i32,
        is_loop: bool,
    },

    PlayClip {
        track_index: i32,
        slot_index: i32,
    },

    StopTrack {
        track_index: i32,
    },

    /// Launch every clip in the given slot row.
    PlayScene {
        slot_index: i32,
    },

    Play,

    Stop,

    SetBpm {
        bpm: f32,
    },

    SaveProject {
        path: String,
    },

    LoadProject {
        path: String,
    },

    Quit,
}

impl Request {
    /// Command name the engine echoes back in [`Notification::Acknowledge`].
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::LoadPlugin { .. } => "LOAD_PLUGIN",
            Self::RemovePlugin { .. } => "REMOVE_PLUGIN",
            Self::ShowPluginGui { .. } => "SHOW_PLUGIN_GUI",
            Self::SetParamValue { .. } => "SET_PARAM_VALUE",
            Self::LoadClip { .. } => "LOAD_CLIP",
            Self::DeleteClip { .. } => "DELETE_CLIP",
            Self::SetClipLoop { .. } => "SET_CLIP_LOOP",
            Self::PlayClip { .. } => "PLAY_CLIP",
            Self::StopTrack { .. } => "STOP_TRACK",
            Self::PlayScene { .. } => "PLAY_SCENE",
            Self::Play => "PLAY",
            Self::Stop => "STOP",
            Self::SetBpm { .. } => "SET_BPM",
            Self::SaveProject { .. } => "SAVE_PROJECT",
            Self::LoadProject { .. } => "LOAD_PROJECT",
            Self::Quit => "QUIT",
        }
    }
}

/// Events from the engine to the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Application-level delivery confirmation for a request.
    Acknowledge { command_type: String, success: bool },

    /// Parameters of a freshly loaded plugin.
    ParamList {
        track_index: i32,
        plugin_index: i32,
        plugin_name: String,
        is_instrument: bool,
        params: Vec<ParamInfo>,
    },

    Log { message: String },

    ClipInfo {
        track_index: i32,
        slot_index: i32,
        name: String,
    },

    /// Peak summary of a loaded audio clip.
    ClipWaveform {
        track_index: i32,
        slot_index: i32,
        peaks: Vec<f32>,
    },

    /// Periodic meter update.
    TrackLevels { levels: Vec<TrackLevel> },

    /// The engine dropped its project; the surface should clear its views.
    ClearProject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub id: u32,
    pub name: String,
    pub default_value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackLevel {
    pub track_index: i32,
    pub left: f32,
    pub right: f32,
}
