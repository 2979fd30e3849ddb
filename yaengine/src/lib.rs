//! # yaengine
//!
//! Moteur de lecture de YaMusic, exécuté dans un processus séparé.
//!
//! Le lecteur écrit des requêtes JSON (une par ligne) sur l'entrée standard
//! du moteur et lit sur sa sortie standard les instantanés du tableau de bord
//! et les événements (`about_to_finish`, `state_changed`, `repeat_toggled`).
//!
//! - [`run_engine`] : boucle du moteur (tick de 500 ms)
//! - [`EngineHandle`] : côté lecteur, commandes + miroir [`Dashboard`]
//! - [`MediaPipeline`] / [`ClockPipeline`] : pipeline média piloté par le moteur
//!
//! ```rust,ignore
//! use yaengine::{EngineCommand, EngineEvent, EngineHandle, ProcessLauncher};
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<EngineEvent>();
//! let launcher = ProcessLauncher::current_exe(Vec::new())?;
//! let mut engine = EngineHandle::spawn(&launcher, tx).await?;
//! engine.enqueue("https://example.test/track.mp3", Some(215.0)).await?;
//! engine.command(EngineCommand::SetVolume(0.5)).await?;
//! ```

pub mod dashboard;
pub mod engine;
pub mod error;
pub mod handle;
pub mod pipeline;
pub mod protocol;

pub use dashboard::{Dashboard, DashboardSnapshot, DashboardWriter, PlaybackState};
pub use engine::{DEFAULT_TICK, Engine, run_engine};
pub use error::{EngineError, PipelineError, Result};
pub use handle::{
    ENGINE_EXITED, EngineExit, EngineHandle, EngineLauncher, InProcessLauncher, LaunchedEngine,
    ProcessLauncher,
};
pub use pipeline::{ClockPipeline, MediaPipeline, PipelineEvent};
pub use protocol::{EngineCommand, EngineEvent, EngineMessage, EngineRequest};
