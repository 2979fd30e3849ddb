//! Playlist source: the user's liked tracks or one of their playlists

use crate::config_ext::SourceConfigExt;
use crate::controller::{Mode, SourceController, SourceSettings};
use crate::common::ControllerCore;
use crate::cursor::TrackCursor;
use crate::error::{ControllerError, Result};
use crate::track::Track;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use yacatalog::{CatalogClient, SourceEntry};
use yaconfig::Config;

/// Pseudo-playlist holding the user's liked tracks
pub const MY_LIKES_ID: &str = "my_likes";
pub const MY_LIKES_NAME: &str = "Моя коллекция";

pub struct PlaylistController {
    core: ControllerCore,
    playlist_id: String,
    playlist_name: Option<String>,
    playlists: Vec<SourceEntry>,
    cursor: TrackCursor,
}

impl PlaylistController {
    pub fn new(client: Arc<dyn CatalogClient>, config: Arc<Config>) -> Self {
        let playlist_id = config
            .get_source_id(Mode::Playlist)
            .unwrap_or_else(|| MY_LIKES_ID.to_string());
        Self {
            core: ControllerCore::new(client, config),
            playlist_id,
            playlist_name: None,
            playlists: Vec::new(),
            cursor: TrackCursor::default(),
        }
    }

    async fn fill_playlist(&mut self, entry: &SourceEntry) -> Result<()> {
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let tracks = if entry.id == MY_LIKES_ID {
            self.core
                .call("liked_tracks", || client.liked_tracks(timeout))
                .await?
        } else {
            self.core
                .call("playlist_tracks", || client.playlist_tracks(&entry.id, timeout))
                .await?
        };
        if tracks.is_empty() {
            return Err(ControllerError::NoTracks);
        }
        self.cursor = TrackCursor::new(tracks);
        self.playlist_id = entry.id.clone();
        self.playlist_name = Some(entry.name.clone());
        Ok(())
    }

    /// Reports the outgoing track and sets up the one under the cursor
    async fn switch_to_cursor(&mut self, played: f64) -> Result<Track> {
        if let Some(previous) = self.core.take_current() {
            self.core.report_ended(&previous, played);
        }
        let track = self.cursor.current().cloned().ok_or(ControllerError::NoTracks)?;
        let info = self.core.setup_current(track, None).await?;
        self.core.report_started();
        Ok(info)
    }
}

#[async_trait]
impl SourceController for PlaylistController {
    fn mode(&self) -> Mode {
        Mode::Playlist
    }

    async fn initialize(&mut self) -> Result<()> {
        self.playlists = vec![SourceEntry::new(MY_LIKES_ID, MY_LIKES_NAME)];
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        match self
            .core
            .call("user_playlists", || client.user_playlists(timeout))
            .await
        {
            Ok(playlists) => self.playlists.extend(
                playlists
                    .into_iter()
                    .map(|p| SourceEntry::new(p.kind, p.title)),
            ),
            Err(err) => warn!("Cannot retrieve user playlists: {}", err),
        }
        debug!(count = self.playlists.len(), "Playlists loaded");
        Ok(())
    }

    async fn set_source(
        &mut self,
        source_id: Option<&str>,
        _settings: Option<SourceSettings>,
        played: f64,
    ) -> Result<Track> {
        let id = source_id.unwrap_or(self.playlist_id.as_str()).to_string();
        let entry = self
            .playlists
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownSource(id.clone()))?;

        if let Some(previous) = self.core.take_current() {
            self.core.report_ended(&previous, played);
        }
        self.fill_playlist(&entry).await?;
        info!(playlist = %entry.id, tracks = self.cursor.len(), "Opened playlist \"{}\"", entry.name);

        self.switch_to_cursor(0.0).await
    }

    async fn apply_source_settings(
        &mut self,
        _settings: &SourceSettings,
        _force: bool,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn get_next_track(&mut self, played: f64) -> Result<Track> {
        if self.cursor.advance().is_none() {
            return Err(ControllerError::NoTracks);
        }
        self.switch_to_cursor(played).await
    }

    async fn like_track(&mut self) -> Result<bool> {
        self.core.like_current().await
    }

    fn get_sources_list(&self) -> Vec<SourceEntry> {
        self.playlists.clone()
    }

    fn get_short_playlist(&self) -> Vec<Track> {
        self.cursor.short_list()
    }

    fn get_playlist_position(&self) -> usize {
        self.cursor.position()
    }

    async fn set_playlist_position(&mut self, position: usize, played: f64) -> Result<Track> {
        self.cursor.seek(position)?;
        self.switch_to_cursor(played).await
    }

    fn source_id(&self) -> Option<String> {
        Some(self.playlist_id.clone())
    }

    fn source_name(&self) -> Option<String> {
        self.playlist_name.clone()
    }

    fn high_res(&self) -> bool {
        self.core.high_res
    }

    fn set_high_res(&mut self, high_res: bool) {
        self.core.high_res = high_res;
    }

    async fn shutdown(&mut self, played: f64) {
        self.core.shutdown(played).await;
        debug!("Playlist controller shut down");
    }
}
