//! Unrecoverable player errors

use yaengine::EngineError;
use yasource::{ControllerError, Mode};

pub type Result<T> = std::result::Result<T, YaPlayerError>;

/// Errors that stop the player
///
/// Everything else is turned into a status line for the UI.
#[derive(Debug, thiserror::Error)]
pub enum YaPlayerError {
    #[error("Startup failed: {0}")]
    Startup(#[source] ControllerError),

    #[error("Cannot switch to {mode} mode: {source}")]
    ModeSwitch {
        mode: Mode,
        #[source]
        source: ControllerError,
    },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The operation needs `init()` first
    #[error("Player is not initialized")]
    NotInitialized,
}
