//! In-memory catalog for tests (feature `testing`)
//!
//! [`MockCatalog`] serves canned stations, batches, playlists and artists
//! and records every call it receives, in order.

use crate::client::CatalogClient;
use crate::error::{CatalogError, Result};
use crate::models::*;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A call received by [`MockCatalog`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Dashboard,
    StationsList,
    StationTracks(String),
    Settings(String, RotorSettings),
    Feedback {
        station: String,
        batch_id: Option<String>,
        feedback: RotorFeedback,
    },
    Tracks(Vec<String>),
    DownloadInfo(String),
    DirectLink(String),
    Like(String),
    PlayAudio(PlayAudio),
    UserPlaylists,
    PlaylistTracks(String),
    LikedTracks,
    SearchArtists(String),
    ArtistAlbums(String),
    AlbumTracks(String),
}

impl Call {
    /// Whether the call is a telemetry report
    pub fn is_report(&self) -> bool {
        matches!(self, Call::PlayAudio(_) | Call::Feedback { .. })
    }
}

pub fn track(id: &str, title: &str, seconds: u64) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![ArtistRef {
            id: Some("1".to_string()),
            name: "Kino".to_string(),
        }],
        albums: vec![Album {
            id: "900".to_string(),
            title: "Gruppa krovi".to_string(),
            year: Some(1988),
            track_count: None,
        }],
        duration_ms: seconds * 1000,
    }
}

pub fn station(kind: &str, tag: &str, name: &str) -> StationResult {
    StationResult {
        station: Station {
            id: StationId {
                kind: kind.to_string(),
                tag: tag.to_string(),
            },
            name: name.to_string(),
            restrictions2: Some(Restrictions::default()),
            id_for_from: Some(format!("{}-{}", kind, tag)),
        },
        settings2: Some(RotorSettings {
            language: "any".to_string(),
            diversity: "default".to_string(),
            mood_energy: "all".to_string(),
        }),
    }
}

pub fn batch(batch_id: &str, tracks: Vec<Track>) -> StationTracks {
    StationTracks {
        id: None,
        batch_id: batch_id.to_string(),
        sequence: tracks
            .into_iter()
            .map(|track| SequenceItem {
                kind: "track".to_string(),
                track,
                liked: Some(false),
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct MockCatalog {
    dashboard: Vec<StationResult>,
    stations: Vec<StationResult>,
    batches: Mutex<HashMap<String, VecDeque<StationTracks>>>,
    reject_settings: bool,
    fail_like: bool,
    fail_playlists: bool,
    liked: Vec<Track>,
    playlists: Vec<PlaylistSummary>,
    playlist_tracks: HashMap<String, Vec<Track>>,
    artists: Vec<ArtistCandidate>,
    albums: HashMap<String, Vec<Album>>,
    album_tracks: HashMap<String, Vec<Track>>,
    calls: Mutex<Vec<Call>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dashboard(mut self, stations: Vec<StationResult>) -> Self {
        self.dashboard = stations;
        self
    }

    pub fn with_stations(mut self, stations: Vec<StationResult>) -> Self {
        self.stations = stations;
        self
    }

    /// Batches served in order for `station` (`type:tag`); the last one
    /// repeats forever
    pub fn with_batches(self, station: &str, batches: Vec<StationTracks>) -> Self {
        self.lock_batches()
            .insert(station.to_string(), batches.into_iter().collect());
        self
    }

    pub fn with_liked(mut self, tracks: Vec<Track>) -> Self {
        self.liked = tracks;
        self
    }

    pub fn with_playlist(mut self, kind: &str, title: &str, tracks: Vec<Track>) -> Self {
        self.playlists.push(PlaylistSummary {
            kind: kind.to_string(),
            title: title.to_string(),
            track_count: tracks.len() as u32,
        });
        self.playlist_tracks.insert(kind.to_string(), tracks);
        self
    }

    /// Registers an artist with `albums` given as `(album, tracks)`
    pub fn with_artist(mut self, id: &str, name: &str, albums: Vec<(Album, Vec<Track>)>) -> Self {
        self.artists.push(ArtistCandidate {
            id: id.to_string(),
            name: name.to_string(),
            genres: vec!["rock".to_string()],
            counts: ArtistCounts {
                direct_albums: albums.len() as u32,
            },
        });
        let mut list = Vec::new();
        for (album, tracks) in albums {
            self.album_tracks.insert(album.id.clone(), tracks);
            list.push(album);
        }
        self.albums.insert(id.to_string(), list);
        self
    }

    pub fn rejecting_settings(mut self) -> Self {
        self.reject_settings = true;
        self
    }

    pub fn failing_like(mut self) -> Self {
        self.fail_like = true;
        self
    }

    pub fn failing_playlists(mut self) -> Self {
        self.fail_playlists = true;
        self
    }

    fn lock_batches(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<StationTracks>>> {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Telemetry calls only
    pub fn reports(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_report).collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn rotor_stations_dashboard(&self, _timeout: Duration) -> Result<Vec<StationResult>> {
        self.record(Call::Dashboard);
        Ok(self.dashboard.clone())
    }

    async fn rotor_stations_list(&self, _timeout: Duration) -> Result<Vec<StationResult>> {
        self.record(Call::StationsList);
        Ok(self.stations.clone())
    }

    async fn rotor_station_tracks(
        &self,
        station: &str,
        _queue: Option<&str>,
        _timeout: Duration,
    ) -> Result<StationTracks> {
        self.record(Call::StationTracks(station.to_string()));
        let mut batches = self.lock_batches();
        let queue = batches
            .get_mut(station)
            .ok_or_else(|| CatalogError::NotFound(station.to_string()))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.ok_or_else(|| CatalogError::NotFound(station.to_string()))
    }

    async fn rotor_station_settings(
        &self,
        station: &str,
        settings: &RotorSettings,
        _timeout: Duration,
    ) -> Result<bool> {
        self.record(Call::Settings(station.to_string(), settings.clone()));
        Ok(!self.reject_settings)
    }

    async fn rotor_feedback(
        &self,
        station: &str,
        batch_id: Option<&str>,
        feedback: &RotorFeedback,
        _timeout: Duration,
    ) -> Result<bool> {
        self.record(Call::Feedback {
            station: station.to_string(),
            batch_id: batch_id.map(str::to_string),
            feedback: feedback.clone(),
        });
        Ok(true)
    }

    async fn tracks(&self, track_ids: &[String], _timeout: Duration) -> Result<Vec<Track>> {
        self.record(Call::Tracks(track_ids.to_vec()));
        let all = self
            .liked
            .iter()
            .chain(self.playlist_tracks.values().flatten())
            .chain(self.album_tracks.values().flatten());
        Ok(all
            .filter(|t| track_ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn download_info(&self, track_id: &str, _timeout: Duration) -> Result<Vec<DownloadInfo>> {
        self.record(Call::DownloadInfo(track_id.to_string()));
        Ok([("mp3", 192), ("aac", 64), ("mp3", 320), ("mp3", 128)]
            .into_iter()
            .map(|(codec, bitrate)| DownloadInfo {
                codec: codec.to_string(),
                bitrate_in_kbps: bitrate,
                download_info_url: format!("https://dl.test/{}/{}/{}", track_id, codec, bitrate),
                gain: false,
                preview: false,
            })
            .collect())
    }

    async fn direct_link(&self, info: &DownloadInfo, _timeout: Duration) -> Result<String> {
        self.record(Call::DirectLink(info.download_info_url.clone()));
        Ok(info.download_info_url.replace("https://dl.test/", "https://stream.test/"))
    }

    async fn like_track(&self, track_id: &str, _timeout: Duration) -> Result<bool> {
        self.record(Call::Like(track_id.to_string()));
        if self.fail_like {
            return Err(CatalogError::from_status_code(400, "like rejected"));
        }
        Ok(true)
    }

    async fn play_audio(&self, report: &PlayAudio, _timeout: Duration) -> Result<()> {
        self.record(Call::PlayAudio(report.clone()));
        Ok(())
    }

    async fn user_playlists(&self, _timeout: Duration) -> Result<Vec<PlaylistSummary>> {
        self.record(Call::UserPlaylists);
        if self.fail_playlists {
            return Err(CatalogError::from_status_code(403, "forbidden"));
        }
        Ok(self.playlists.clone())
    }

    async fn playlist_tracks(&self, kind: &str, _timeout: Duration) -> Result<Vec<Track>> {
        self.record(Call::PlaylistTracks(kind.to_string()));
        self.playlist_tracks
            .get(kind)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(kind.to_string()))
    }

    async fn liked_tracks(&self, _timeout: Duration) -> Result<Vec<Track>> {
        self.record(Call::LikedTracks);
        Ok(self.liked.clone())
    }

    async fn search_artists(&self, text: &str, _timeout: Duration) -> Result<Vec<ArtistCandidate>> {
        self.record(Call::SearchArtists(text.to_string()));
        let needle = text.to_lowercase();
        Ok(self
            .artists
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn artist_albums(&self, artist_id: &str, _timeout: Duration) -> Result<Vec<Album>> {
        self.record(Call::ArtistAlbums(artist_id.to_string()));
        Ok(self.albums.get(artist_id).cloned().unwrap_or_default())
    }

    async fn album_tracks(&self, album_id: &str, _timeout: Duration) -> Result<Vec<Track>> {
        self.record(Call::AlbumTracks(album_id.to_string()));
        self.album_tracks
            .get(album_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(album_id.to_string()))
    }
}
