//! Events consumed by the player loop

use yaengine::{EngineEvent, PlaybackState};
use yasource::{SourceSettings, Track};

/// Keyboard actions understood by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Like,
    Skip,
    Forward,
    Back,
    PlayAgain,
    Repeat,
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    ModeRadio,
    ModePlaylist,
    ModeArtist,
    ShowSources,
    ToggleHighRes,
    Exit,
}

/// A source picked in the UI, with optional settings
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSelection {
    pub source_id: String,
    pub settings: Option<SourceSettings>,
}

impl SourceSelection {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: SourceSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Artist drill-down step
#[derive(Debug, Clone, PartialEq)]
pub enum ArtistQuery {
    Artists(String),
    Albums(String),
    Tracks(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    StateChanged(PlaybackState),
    KeyPressed(Key),
    /// A new track became current
    TagsChanged(Track),
    AboutToFinish,
    RepeatToggled(bool),
    SourceSettingsUpdated(SourceSelection),
    Status(String),
    SkipToPosition(usize),
    Query(ArtistQuery),
    Shutdown,
}

impl From<EngineEvent> for UiEvent {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::AboutToFinish => UiEvent::AboutToFinish,
            EngineEvent::StateChanged(state) => UiEvent::StateChanged(state),
            EngineEvent::RepeatToggled(repeat) => UiEvent::RepeatToggled(repeat),
        }
    }
}
