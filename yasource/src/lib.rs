//! # yasource
//!
//! Source controllers for YaMusic.
//!
//! A source controller knows where the next track comes from. Three kinds
//! are provided, all behind the [`SourceController`] trait:
//!
//! - [`StationController`]: rotor radio stations, batch by batch, with
//!   per-station settings and rotor feedback
//! - [`PlaylistController`]: the user's liked tracks and playlists
//! - [`ArtistController`]: artist search, album selection, album tracks
//!
//! Every catalog call goes through the retry wrapper of `yacatalog`.
//! Playback reports are sent in the background and never fail an operation.
//!
//! ```rust,ignore
//! use yasource::{SourceController, StationController};
//!
//! let mut station = StationController::new(client, config);
//! station.initialize().await?;
//! let first = station.set_source(Some("onyourwave"), None, 0.0).await?;
//! println!("Now playing {}", first);
//! let next = station.get_next_track(0.0).await?;
//! ```

pub mod artist;
pub mod config_ext;
pub mod controller;
pub mod common;
pub mod cursor;
pub mod error;
pub mod playlist;
pub mod station;
pub mod telemetry;
pub mod track;

pub use artist::ArtistController;
pub use config_ext::SourceConfigExt;
pub use controller::{Mode, SourceController, SourceSettings};
pub use common::{generate_play_id, select_download_info};
pub use error::{ControllerError, Result};
pub use playlist::{MY_LIKES_ID, PlaylistController};
pub use station::StationController;
pub use telemetry::{Report, Telemetry};
pub use track::Track;
