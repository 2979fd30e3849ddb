//! Artist source: search an artist, pick albums, play their tracks
//!
//! The drill-down goes candidates -> albums -> tracks. `query_tracks`
//! prepares a list that the next `set_source` starts playing.

use crate::config_ext::SourceConfigExt;
use crate::controller::{Mode, SourceController, SourceSettings};
use crate::common::ControllerCore;
use crate::cursor::TrackCursor;
use crate::error::{ControllerError, Result};
use crate::track::Track;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use yacatalog::{Album, ArtistCandidate, CatalogClient, SourceEntry, Track as CatalogTrack};
use yaconfig::Config;

pub struct ArtistController {
    core: ControllerCore,
    artist_id: Option<String>,
    artist_name: Option<String>,
    candidates: Vec<ArtistCandidate>,
    albums: Vec<Album>,
    prepared: Vec<CatalogTrack>,
    prepared_albums: Vec<String>,
    cursor: TrackCursor,
}

impl ArtistController {
    pub fn new(client: Arc<dyn CatalogClient>, config: Arc<Config>) -> Self {
        let artist_id = config.get_source_id(Mode::Artist);
        Self {
            core: ControllerCore::new(client, config),
            artist_id,
            artist_name: None,
            candidates: Vec::new(),
            albums: Vec::new(),
            prepared: Vec::new(),
            prepared_albums: Vec::new(),
            cursor: TrackCursor::default(),
        }
    }

    /// Fetches the albums in order and flattens their tracks
    async fn fetch_album_tracks(&self, album_ids: &[String]) -> Result<Vec<CatalogTrack>> {
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let mut tracks = Vec::new();
        for album_id in album_ids {
            let album_tracks = self
                .core
                .call("album_tracks", || client.album_tracks(album_id, timeout))
                .await?;
            tracks.extend(album_tracks);
        }
        Ok(tracks)
    }

    async fn switch_to_cursor(&mut self, played: f64) -> Result<Track> {
        if let Some(previous) = self.core.take_current() {
            self.core.report_ended(&previous, played);
        }
        let track = self
            .cursor
            .current()
            .cloned()
            .ok_or(ControllerError::NoTracks)?;
        let info = self.core.setup_current(track, None).await?;
        self.core.report_started();
        Ok(info)
    }
}

fn candidate_label(artist: &ArtistCandidate) -> String {
    if artist.genres.is_empty() {
        format!("{} [{} albums]", artist.name, artist.counts.direct_albums)
    } else {
        format!(
            "{} ({}) [{} albums]",
            artist.name,
            artist.genres.join(", "),
            artist.counts.direct_albums
        )
    }
}

fn album_label(album: &Album) -> String {
    match album.year {
        Some(year) => format!("({})-{}", year, album.title),
        None => album.title.clone(),
    }
}

fn track_label(track: &CatalogTrack) -> String {
    match track.albums.first() {
        Some(album) => match album.year {
            Some(year) => format!("({}) {} - {}", year, album.title, track.title),
            None => format!("{} - {}", album.title, track.title),
        },
        None => track.title.clone(),
    }
}

#[async_trait]
impl SourceController for ArtistController {
    fn mode(&self) -> Mode {
        Mode::Artist
    }

    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_source(
        &mut self,
        source_id: Option<&str>,
        settings: Option<SourceSettings>,
        played: f64,
    ) -> Result<Track> {
        let tracks = match settings {
            Some(SourceSettings::Artist { album_ids }) if !album_ids.is_empty() => {
                let tracks = self.fetch_album_tracks(&album_ids).await?;
                self.prepared_albums = album_ids;
                tracks
            }
            _ => self.prepared.clone(),
        };
        if tracks.is_empty() {
            return Err(ControllerError::NoTracks);
        }

        if let Some(id) = source_id {
            if self.artist_id.as_deref() != Some(id) {
                self.artist_name = self
                    .candidates
                    .iter()
                    .find(|a| a.id == id)
                    .map(|a| a.name.clone());
            }
            self.artist_id = Some(id.to_string());
        }

        self.prepared = tracks.clone();
        self.cursor = TrackCursor::new(tracks);
        info!(
            artist = ?self.artist_id,
            tracks = self.cursor.len(),
            "Playing {} album(s) of {}",
            self.prepared_albums.len(),
            self.artist_name.as_deref().unwrap_or("unknown artist")
        );
        self.switch_to_cursor(played).await
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

    /// Albums of the selected artist
    fn get_sources_list(&self) -> Vec<SourceEntry> {
        self.albums
            .iter()
            .map(|a| SourceEntry::new(a.id.clone(), album_label(a)))
            .collect()
    }

    fn get_source_settings(&self, _source_id: Option<&str>) -> Option<SourceSettings> {
        if self.prepared_albums.is_empty() {
            None
        } else {
            Some(SourceSettings::Artist {
                album_ids: self.prepared_albums.clone(),
            })
        }
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

    async fn query_artists(&mut self, text: &str) -> Result<Vec<SourceEntry>> {
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        self.candidates = self
            .core
            .call("search_artists", || client.search_artists(text, timeout))
            .await?;
        debug!(query = text, found = self.candidates.len(), "Artist search");
        Ok(self
            .candidates
            .iter()
            .map(|a| SourceEntry::new(a.id.clone(), candidate_label(a)))
            .collect())
    }

    async fn query_albums(&mut self, artist_id: &str) -> Result<Vec<SourceEntry>> {
        if let Some(artist) = self.candidates.iter().find(|a| a.id == artist_id) {
            self.artist_name = Some(artist.name.clone());
        }
        self.artist_id = Some(artist_id.to_string());

        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let mut albums = self
            .core
            .call("artist_albums", || client.artist_albums(artist_id, timeout))
            .await?;
        albums.sort_by_key(|a| a.year.unwrap_or_default());
        self.albums = albums;
        Ok(self.get_sources_list())
    }

    async fn query_tracks(&mut self, album_ids: &[String]) -> Result<Vec<SourceEntry>> {
        self.prepared = self.fetch_album_tracks(album_ids).await?;
        self.prepared_albums = album_ids.to_vec();
        Ok(self
            .prepared
            .iter()
            .map(|t| SourceEntry::new(t.id.clone(), track_label(t)))
            .collect())
    }

    fn has_tracks(&self) -> bool {
        !self.prepared.is_empty()
    }

    fn source_id(&self) -> Option<String> {
        self.artist_id.clone()
    }

    fn source_name(&self) -> Option<String> {
        self.artist_name.clone()
    }

    fn high_res(&self) -> bool {
        self.core.high_res
    }

    fn set_high_res(&mut self, high_res: bool) {
        self.core.high_res = high_res;
    }

    async fn shutdown(&mut self, played: f64) {
        self.core.shutdown(played).await;
        debug!("Artist controller shut down");
    }
}
