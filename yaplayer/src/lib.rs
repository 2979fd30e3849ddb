//! # yaplayer
//!
//! Orchestration du lecteur YaMusic.
//!
//! - [`Player`] : possède le contrôleur de source actif et le moteur de
//!   lecture, traduit les demandes de l'UI en appels
//! - [`PlayerApp`] : boucle d'événements [`UiEvent`] avec les tâches de
//!   statut et de progression
//! - [`Display`] : ce que le front-end doit savoir afficher
//!
//! ```rust,ignore
//! use yaplayer::{PlayerApp, UiEvent, Key};
//!
//! let mut app = PlayerApp::new(config, client, launcher, display);
//! let events = app.sender();
//! events.send(UiEvent::KeyPressed(Key::Skip))?;
//! app.run().await?;
//! ```

pub mod app;
pub mod config_ext;
pub mod display;
pub mod error;
pub mod events;
pub mod player;

pub use app::PlayerApp;
pub use config_ext::PlayerConfigExt;
pub use display::{Display, format_progress};
pub use error::{Result, YaPlayerError};
pub use events::{ArtistQuery, Key, SourceSelection, UiEvent};
pub use player::{ENGINE_SHUTDOWN_TIMEOUT, Player, PlayerState, media_uri};
