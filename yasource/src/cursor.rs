//! Wrapping cursor over a finite track list (playlists and artist catalogs)

use crate::error::{ControllerError, Result};
use crate::track::Track;
use yacatalog::Track as CatalogTrack;

#[derive(Debug, Clone, Default)]
pub struct TrackCursor {
    tracks: Vec<CatalogTrack>,
    position: usize,
}

impl TrackCursor {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        Self {
            tracks,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&CatalogTrack> {
        self.tracks.get(self.position)
    }

    /// Moves to the next track, back to the first one after the last
    pub fn advance(&mut self) -> Option<&CatalogTrack> {
        if self.tracks.is_empty() {
            return None;
        }
        self.position = (self.position + 1) % self.tracks.len();
        self.current()
    }

    pub fn seek(&mut self, position: usize) -> Result<&CatalogTrack> {
        if position >= self.tracks.len() {
            return Err(ControllerError::PositionOutOfBounds {
                position,
                len: self.tracks.len(),
            });
        }
        self.position = position;
        Ok(&self.tracks[position])
    }

    pub fn short_list(&self) -> Vec<Track> {
        self.tracks.iter().map(Track::short).collect()
    }
}
