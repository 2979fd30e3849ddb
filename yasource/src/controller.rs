//! The `SourceController` trait and the types shared by its implementations

use crate::error::{ControllerError, Result};
use crate::track::Track;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use yacatalog::{Restrictions, RotorSettings, SourceEntry};

/// Kind of source the player is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Radio,
    Playlist,
    Artist,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Radio => "radio",
            Mode::Playlist => "playlist",
            Mode::Artist => "artist",
        }
    }

    /// Config key holding the last source id used in this mode
    pub fn source_key(&self) -> &'static str {
        match self {
            Mode::Radio => "radio_id",
            Mode::Playlist => "playlist_id",
            Mode::Artist => "artist_id",
        }
    }

    /// Whether the source exposes a browsable track list
    pub fn has_playlist(&self) -> bool {
        matches!(self, Mode::Playlist | Mode::Artist)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "radio" | "station" => Ok(Mode::Radio),
            "playlist" => Ok(Mode::Playlist),
            "artist" => Ok(Mode::Artist),
            other => Err(ControllerError::UnknownSource(other.to_string())),
        }
    }
}

/// Source-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceSettings {
    /// Rotor settings of a station
    Station(RotorSettings),
    /// Albums whose tracks make up the artist playlist
    Artist { album_ids: Vec<String> },
}

/// A source of tracks (radio station, playlist or artist catalog)
///
/// Mutating operations take `&mut self`: a controller performs at most one
/// advance at a time. Read accessors never touch the network.
#[async_trait]
pub trait SourceController: Send + Sync {
    fn mode(&self) -> Mode;

    /// Populates the selectable sources
    async fn initialize(&mut self) -> Result<()>;

    /// Switches to `source_id` (the configured one when `None`), applies
    /// `settings` if given and returns the first track.
    ///
    /// If a track was current, its playback is first reported as ended with
    /// `played` seconds.
    async fn set_source(
        &mut self,
        source_id: Option<&str>,
        settings: Option<SourceSettings>,
        played: f64,
    ) -> Result<Track>;

    /// Applies settings to the current source
    ///
    /// Unless `force` is set, settings equal to the effective ones are not
    /// sent again. `Ok(false)` means the catalog rejected them.
    async fn apply_source_settings(&mut self, settings: &SourceSettings, force: bool)
    -> Result<bool>;

    /// Reports the current track as finished (`played == 0`) or skipped and
    /// returns the following one
    async fn get_next_track(&mut self, played: f64) -> Result<Track>;

    /// Adds the current track to the user's favorites
    async fn like_track(&mut self) -> Result<bool>;

    fn get_sources_list(&self) -> Vec<SourceEntry>;

    fn get_source_restrictions(&self, _source_id: Option<&str>) -> Option<Restrictions> {
        None
    }

    fn get_source_settings(&self, _source_id: Option<&str>) -> Option<SourceSettings> {
        None
    }

    /// Track list of the current source, without stream URIs
    fn get_short_playlist(&self) -> Vec<Track> {
        Vec::new()
    }

    fn get_playlist_position(&self) -> usize {
        0
    }

    async fn set_playlist_position(&mut self, _position: usize, _played: f64) -> Result<Track> {
        Err(ControllerError::NotSupported("set_playlist_position"))
    }

    /// Searches artists by name
    async fn query_artists(&mut self, _text: &str) -> Result<Vec<SourceEntry>> {
        Err(ControllerError::NotSupported("query_artists"))
    }

    /// Lists the albums of an artist, oldest first
    async fn query_albums(&mut self, _artist_id: &str) -> Result<Vec<SourceEntry>> {
        Err(ControllerError::NotSupported("query_albums"))
    }

    /// Prepares the tracks of the given albums for the next `set_source`
    async fn query_tracks(&mut self, _album_ids: &[String]) -> Result<Vec<SourceEntry>> {
        Err(ControllerError::NotSupported("query_tracks"))
    }

    /// Whether `set_source(None, None, _)` has something to play
    fn has_tracks(&self) -> bool {
        true
    }

    fn source_id(&self) -> Option<String>;

    fn source_name(&self) -> Option<String>;

    fn high_res(&self) -> bool;

    fn set_high_res(&mut self, high_res: bool);

    /// Reports the in-flight track and waits for pending reports
    async fn shutdown(&mut self, played: f64);
}
