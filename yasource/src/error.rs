//! Error types for source controllers

use yacatalog::CatalogError;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors raised by a [`SourceController`](crate::SourceController)
///
/// The player catches these at its boundary and turns them into a status
/// line for the UI.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A catalog call failed after exhausting its retries
    #[error("{call} failed: {source}")]
    Remote {
        call: String,
        #[source]
        source: CatalogError,
    },

    #[error("No such source: {0}")]
    UnknownSource(String),

    #[error("Position {position} is out of playlist bounds ({len} tracks)")]
    PositionOutOfBounds { position: usize, len: usize },

    /// Nothing has been selected or the selection is empty
    #[error("No tracks to play")]
    NoTracks,

    #[error("Station {0} returned an empty batch")]
    EmptyBatch(String),

    #[error("No {codec} download info for track {track_id}")]
    NoDownloadInfo { track_id: String, codec: String },

    #[error("{0} is not supported by this source")]
    NotSupported(&'static str),

    /// Persisting a value to the configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl ControllerError {
    pub(crate) fn remote(call: &str, source: CatalogError) -> Self {
        Self::Remote {
            call: call.to_string(),
            source,
        }
    }
}
