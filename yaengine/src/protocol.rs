//! Wire protocol between the player and the engine process
//!
//! One JSON document per line. The player writes [`EngineRequest`]s on the
//! engine's stdin; the engine answers with [`EngineMessage`]s on stdout.

use crate::dashboard::{DashboardSnapshot, PlaybackState};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "value", rename_all = "snake_case")]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
    PlayAgain,
    ToggleRepeat,
    SkipNext,
    /// Moves 5 % of the duration forward
    SkipForward,
    SkipBack,
    /// Seconds from the start of the track
    SetPosition(f64),
    /// 0.0 to 1.0
    SetVolume(f64),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineRequest {
    Command {
        command: EngineCommand,
    },
    /// Media for the next track
    Enqueue {
        uri: String,
        duration_hint: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "value", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The current track is about to end; enqueue the next one
    AboutToFinish,
    StateChanged(PlaybackState),
    RepeatToggled(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    Dashboard { snapshot: DashboardSnapshot },
    Event { event: EngineEvent },
}

impl From<EngineCommand> for EngineRequest {
    fn from(command: EngineCommand) -> Self {
        EngineRequest::Command { command }
    }
}

impl From<EngineEvent> for EngineMessage {
    fn from(event: EngineEvent) -> Self {
        EngineMessage::Event { event }
    }
}

pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

pub fn decode<T: DeserializeOwned>(line: &str) -> serde_json::Result<T> {
    serde_json::from_str(line.trim())
}
