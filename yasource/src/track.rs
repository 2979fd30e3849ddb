//! Track value object handed to the player and the UI

use serde::{Deserialize, Serialize};
use std::fmt;
use yacatalog::Track as CatalogTrack;

/// What the player knows about a track
///
/// A new `Track` is built each time a source advances; it is never mutated
/// afterwards. `uri` is only resolved for the track about to be enqueued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Artist names joined with `,`
    pub artist: String,
    /// Whole seconds
    pub duration: u64,
    pub uri: Option<String>,
    /// `None` when the catalog did not say
    pub liked: Option<bool>,
}

impl Track {
    /// Short form, without stream URI or like flag
    pub fn short(track: &CatalogTrack) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artists_name().join(","),
            duration: track.duration_ms / 1000,
            uri: None,
            liked: None,
        }
    }

    pub fn with_uri(mut self, uri: String) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn with_liked(mut self, liked: Option<bool>) -> Self {
        self.liked = liked;
        self
    }

    /// `m:ss`, or `h:mm:ss` past one hour
    pub fn duration_str(&self) -> String {
        let (minutes, seconds) = (self.duration / 60, self.duration % 60);
        let (hours, minutes) = (minutes / 60, minutes % 60);
        if hours == 0 {
            format!("{}:{:02}", minutes, seconds)
        } else {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        }
    }

    /// Renders `Artist - Title (m:ss)` padded or truncated to `width` characters
    ///
    /// The duration column is always kept; a title that does not fit is cut
    /// and ends with `...`.
    pub fn fixed_width(&self, width: usize) -> String {
        let duration = format!("({})", self.duration_str());
        let title = format!("{} - {}", self.artist, self.title);
        let room = width.saturating_sub(duration.chars().count());

        let title = if title.chars().count() <= room {
            title
        } else {
            let keep = room.saturating_sub(4);
            let mut cut: String = title.chars().take(keep).collect();
            cut.push_str("...");
            cut
        };
        format!("{:<room$}{}", title, duration, room = room)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.artist, self.title, self.duration_str())
    }
}
