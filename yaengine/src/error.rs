//! Error types for the playback engine

use tokio_util::codec::LinesCodecError;

/// Result type alias for engine handle operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors seen by the player side of the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot launch engine: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Engine stream error: {0}")]
    Codec(#[from] LinesCodecError),

    /// The engine process is gone or its stdin is closed
    #[error("Engine is not running")]
    NotRunning,
}

/// Failures of the media pipeline inside the engine process
///
/// Any of these is fatal to the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid media URI: {0}")]
    InvalidUri(String),

    #[error("No media loaded")]
    NoMedia,

    #[error("Pipeline failure: {0}")]
    Failed(String),
}
