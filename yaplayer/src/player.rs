//! Player orchestrator
//!
//! The player owns the active source controller and the engine handle. It
//! turns UI requests into controller calls, enqueues the resulting media
//! and forwards engine commands. Controller failures become status events;
//! only `init`, `start` and `switch_mode` return an error.

use crate::config_ext::PlayerConfigExt;
use crate::error::{Result, YaPlayerError};
use crate::events::{SourceSelection, UiEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use yacatalog::{CatalogClient, Restrictions, SourceEntry};
use yaconfig::Config;
use yaengine::{Dashboard, EngineCommand, EngineHandle, EngineLauncher, PlaybackState};
use yasource::{
    ArtistController, ControllerError, Mode, PlaylistController, SourceConfigExt,
    SourceController, SourceSettings, StationController, Track,
};

/// Bound on waiting for the engine to exit
pub const ENGINE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Uninitialized,
    ControllerReady,
    Playing,
    Paused,
    Error,
    ShutDown,
}

/// Turns a local path into a `file://` URI
pub fn media_uri(uri: &str) -> String {
    if uri.starts_with('/') {
        format!("file://{}", uri)
    } else {
        uri.to_string()
    }
}

pub struct Player {
    config: Arc<Config>,
    client: Arc<dyn CatalogClient>,
    launcher: Arc<dyn EngineLauncher>,
    events: mpsc::UnboundedSender<UiEvent>,
    mode: Mode,
    controller: Option<Box<dyn SourceController>>,
    engine: Option<EngineHandle>,
    state: PlayerState,
    /// Last requested volume
    volume: f64,
    current: Option<Track>,
}

impl Player {
    pub fn new(
        config: Arc<Config>,
        client: Arc<dyn CatalogClient>,
        launcher: Arc<dyn EngineLauncher>,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            mode: config.get_mode(),
            volume: config.get_volume(),
            config,
            client,
            launcher,
            events,
            controller: None,
            engine: None,
            state: PlayerState::Uninitialized,
            current: None,
        }
    }

    /// The only place that knows the concrete controllers
    fn build_controller(&self, mode: Mode) -> Box<dyn SourceController> {
        let client = self.client.clone();
        let config = self.config.clone();
        match mode {
            Mode::Radio => Box::new(StationController::new(client, config)),
            Mode::Playlist => Box::new(PlaylistController::new(client, config)),
            Mode::Artist => Box::new(ArtistController::new(client, config)),
        }
    }

    fn controller_mut(&mut self) -> Result<&mut Box<dyn SourceController>> {
        self.controller
            .as_mut()
            .ok_or(YaPlayerError::NotInitialized)
    }

    /// Sends a status line to the UI
    fn ui_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        let _ = self.events.send(UiEvent::Status(message));
    }

    fn publish(&mut self, track: Track) {
        info!(track_id = %track.id, "Now playing {}", track);
        self.current = Some(track.clone());
        let _ = self.events.send(UiEvent::TagsChanged(track));
    }

    pub async fn init(&mut self) -> Result<()> {
        let mut controller = self.build_controller(self.mode);
        controller
            .initialize()
            .await
            .map_err(YaPlayerError::Startup)?;
        info!(mode = %self.mode, "Source controller ready");
        self.controller = Some(controller);
        self.state = PlayerState::ControllerReady;
        Ok(())
    }

    /// Sets up the default source and starts the engine on its first track
    pub async fn start(&mut self) -> Result<()> {
        let track = self
            .controller_mut()?
            .set_source(None, None, 0.0)
            .await
            .map_err(YaPlayerError::Startup)?;
        self.launch_engine(track).await
    }

    async fn launch_engine(&mut self, track: Track) -> Result<()> {
        let mut engine = EngineHandle::spawn(self.launcher.as_ref(), self.events.clone()).await?;
        engine.command(EngineCommand::SetVolume(self.volume)).await?;
        if let Some(uri) = track.uri.as_deref() {
            engine
                .enqueue(&media_uri(uri), Some(track.duration as f64))
                .await?;
        }
        self.engine = Some(engine);
        self.state = PlayerState::Playing;
        self.publish(track);
        Ok(())
    }

    /// Queues `track` in the running engine and makes it current
    async fn enqueue(&mut self, track: Track) -> bool {
        if self.engine.is_none() {
            return false;
        }
        let Some(uri) = track.uri.as_deref().map(media_uri) else {
            self.ui_error(format!("No stream for {}", track));
            return false;
        };
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        if let Err(err) = engine.enqueue(&uri, Some(track.duration as f64)).await {
            self.ui_error(err.to_string());
            return false;
        }
        self.publish(track);
        true
    }

    /// Plays `track` now: enqueue and skip, or start the engine
    async fn play_now(&mut self, track: Track) -> Result<()> {
        if self.engine.is_none() {
            return self.launch_engine(track).await;
        }
        if self.enqueue(track).await {
            // with repeat on, skip_next would ask for yet another track
            if self.repeat_state() {
                self.send_command(EngineCommand::ToggleRepeat).await;
            }
            self.send_command(EngineCommand::SkipNext).await;
        }
        Ok(())
    }

    pub async fn switch_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == self.mode && self.controller.is_some() {
            return Ok(());
        }
        info!(from = %self.mode, to = %mode, "Switching mode");
        self.persist_state();
        let played = self.position();
        if let Some(mut old) = self.controller.take() {
            old.shutdown(played).await;
        }
        self.current = None;

        let mut controller = self.build_controller(mode);
        self.mode = mode;
        if let Err(err) = self.config.set_mode(mode) {
            warn!("Cannot store mode: {}", err);
        }
        let switch_err = |source| YaPlayerError::ModeSwitch { mode, source };
        controller.initialize().await.map_err(switch_err)?;

        if mode == Mode::Artist && !controller.has_tracks() {
            self.controller = Some(controller);
            self.send_command(EngineCommand::Stop).await;
            debug!("Artist mode waits for a selection");
            return Ok(());
        }

        let track = controller
            .set_source(None, None, 0.0)
            .await
            .map_err(switch_err)?;
        self.controller = Some(controller);
        self.play_now(track).await
    }

    /// Applies a source picked in the UI; `false` on failure
    pub async fn apply_source_settings(&mut self, selection: SourceSelection) -> bool {
        let mode = self.mode;
        let played = self.position();
        let Some(controller) = self.controller.as_mut() else {
            return false;
        };
        let same_source = controller.source_id().as_deref() == Some(selection.source_id.as_str());

        if same_source && mode != Mode::Artist {
            let Some(settings) = selection.settings else {
                return true;
            };
            return match controller.apply_source_settings(&settings, false).await {
                Ok(accepted) => {
                    if accepted {
                        self.persist_state();
                    } else {
                        self.ui_error("Settings rejected");
                    }
                    accepted
                }
                Err(err) => {
                    self.ui_error(err.to_string());
                    false
                }
            };
        }

        let result = controller
            .set_source(Some(&selection.source_id), selection.settings, played)
            .await;
        match result {
            Ok(track) => {
                if let Err(err) = self.play_now(track).await {
                    self.ui_error(err.to_string());
                    return false;
                }
                self.persist_state();
                true
            }
            Err(err) => {
                self.ui_error(err.to_string());
                false
            }
        }
    }

    /// Next track on user request
    pub async fn skip(&mut self) {
        if !self.repeat_state() {
            let played = self.position();
            if let Some(track) = self.advance(played).await {
                self.enqueue(track).await;
            }
        }
        self.send_command(EngineCommand::SkipNext).await;
    }

    /// Next track when the engine is about to finish the current one
    pub async fn get_next_track(&mut self) {
        if let Some(track) = self.advance(0.0).await {
            if self.enqueue(track).await {
                self.send_command(EngineCommand::Play).await;
            }
        }
    }

    async fn advance(&mut self, played: f64) -> Option<Track> {
        let controller = self.controller.as_mut()?;
        match controller.get_next_track(played).await {
            Ok(track) => Some(track),
            Err(err) => {
                self.ui_error(err.to_string());
                None
            }
        }
    }

    pub async fn skip_to_playlist_position(&mut self, position: usize) {
        if !self.mode.has_playlist() {
            self.ui_error(ControllerError::NotSupported("set_playlist_position").to_string());
            return;
        }
        let played = self.position();
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        match controller.set_playlist_position(position, played).await {
            Ok(track) => {
                if let Err(err) = self.play_now(track).await {
                    self.ui_error(err.to_string());
                }
            }
            Err(err) => self.ui_error(err.to_string()),
        }
    }

    /// `false`, with a status, when the like could not be sent
    pub async fn like_track(&mut self) -> bool {
        let Some(controller) = self.controller.as_mut() else {
            return false;
        };
        match controller.like_track().await {
            Ok(liked) => {
                if liked {
                    if let Some(current) = self.current.as_mut() {
                        current.liked = Some(true);
                    }
                }
                liked
            }
            Err(err) => {
                self.ui_error(err.to_string());
                false
            }
        }
    }

    pub async fn query_artists(&mut self, text: &str) -> Vec<SourceEntry> {
        let result = match self.controller.as_mut() {
            Some(controller) => controller.query_artists(text).await,
            None => return Vec::new(),
        };
        self.entries_or_status(result)
    }

    pub async fn query_albums(&mut self, artist_id: &str) -> Vec<SourceEntry> {
        let result = match self.controller.as_mut() {
            Some(controller) => controller.query_albums(artist_id).await,
            None => return Vec::new(),
        };
        self.entries_or_status(result)
    }

    pub async fn query_tracks(&mut self, album_ids: &[String]) -> Vec<SourceEntry> {
        let result = match self.controller.as_mut() {
            Some(controller) => controller.query_tracks(album_ids).await,
            None => return Vec::new(),
        };
        self.entries_or_status(result)
    }

    fn entries_or_status(&self, result: yasource::Result<Vec<SourceEntry>>) -> Vec<SourceEntry> {
        result.unwrap_or_else(|err| {
            self.ui_error(err.to_string());
            Vec::new()
        })
    }

    async fn send_command(&mut self, command: EngineCommand) {
        let Some(engine) = self.engine.as_mut() else {
            debug!(?command, "No engine, command dropped");
            return;
        };
        if let Err(err) = engine.command(command).await {
            self.ui_error(err.to_string());
        }
    }

    pub async fn play(&mut self) {
        self.send_command(EngineCommand::Play).await;
    }

    pub async fn pause(&mut self) {
        self.send_command(EngineCommand::Pause).await;
    }

    pub async fn stop(&mut self) {
        self.send_command(EngineCommand::Stop).await;
    }

    pub async fn play_again(&mut self) {
        self.send_command(EngineCommand::PlayAgain).await;
    }

    pub async fn toggle_repeat(&mut self) {
        self.send_command(EngineCommand::ToggleRepeat).await;
    }

    pub async fn skip_forward(&mut self) {
        self.send_command(EngineCommand::SkipForward).await;
    }

    pub async fn skip_back(&mut self) {
        self.send_command(EngineCommand::SkipBack).await;
    }

    pub async fn set_position(&mut self, position: f64) {
        self.send_command(EngineCommand::SetPosition(position)).await;
    }

    pub async fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        self.send_command(EngineCommand::SetVolume(self.volume)).await;
    }

    /// Records an engine state change
    pub fn on_state_changed(&mut self, state: PlaybackState) {
        self.state = match state {
            PlaybackState::Playing => PlayerState::Playing,
            PlaybackState::Paused => PlayerState::Paused,
            PlaybackState::Err => PlayerState::Error,
            PlaybackState::Ready => return,
        };
    }

    pub fn player_state(&self) -> PlayerState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.engine.as_ref().map(EngineHandle::dashboard)
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.dashboard().and_then(Dashboard::state)
    }

    pub fn position(&self) -> f64 {
        self.dashboard().map(Dashboard::position).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.dashboard().map(Dashboard::duration).unwrap_or(0.0)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn uri(&self) -> Option<String> {
        self.dashboard().and_then(Dashboard::uri)
    }

    pub fn error(&self) -> Option<String> {
        self.dashboard().and_then(Dashboard::error)
    }

    pub fn repeat_state(&self) -> bool {
        self.dashboard().is_some_and(Dashboard::repeat)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn source_id(&self) -> Option<String> {
        self.controller.as_ref().and_then(|c| c.source_id())
    }

    pub fn source_name(&self) -> Option<String> {
        self.controller.as_ref().and_then(|c| c.source_name())
    }

    pub fn high_res(&self) -> bool {
        self.controller
            .as_ref()
            .map(|c| c.high_res())
            .unwrap_or_else(|| self.config.get_high_res())
    }

    pub fn sources_list(&self) -> Vec<SourceEntry> {
        self.controller
            .as_ref()
            .map(|c| c.get_sources_list())
            .unwrap_or_default()
    }

    pub fn source_restrictions(&self, source_id: Option<&str>) -> Option<Restrictions> {
        self.controller
            .as_ref()
            .and_then(|c| c.get_source_restrictions(source_id))
    }

    pub fn source_settings(&self, source_id: Option<&str>) -> Option<SourceSettings> {
        self.controller
            .as_ref()
            .and_then(|c| c.get_source_settings(source_id))
    }

    pub fn short_playlist(&self) -> Vec<Track> {
        self.controller
            .as_ref()
            .map(|c| c.get_short_playlist())
            .unwrap_or_default()
    }

    pub fn playlist_position(&self) -> usize {
        self.controller
            .as_ref()
            .map(|c| c.get_playlist_position())
            .unwrap_or(0)
    }

    /// Flips the stream quality used for the next resolved track
    pub fn toggle_high_res(&mut self) -> bool {
        let high_res = !self.high_res();
        if let Some(controller) = self.controller.as_mut() {
            controller.set_high_res(high_res);
        }
        if let Err(err) = self.config.set_high_res(high_res) {
            warn!("Cannot store high_res: {}", err);
        }
        high_res
    }

    /// Writes mode, volume, quality and current source to the config file
    pub fn persist_state(&self) {
        let config = &self.config;
        let mut result = config
            .set_mode(self.mode)
            .and_then(|_| config.set_volume(self.volume))
            .and_then(|_| config.set_high_res(self.high_res()));
        if let Some(source_id) = self.source_id() {
            result = result.and_then(|_| config.set_source_id(self.mode, &source_id));
        }
        match result.and_then(|_| config.save()) {
            Ok(()) => debug!(mode = %self.mode, "Player state saved"),
            Err(err) => warn!("Cannot save player state: {:#}", err),
        }
    }

    pub async fn shutdown(&mut self) {
        if self.state == PlayerState::ShutDown {
            return;
        }
        info!("Shutting down player");
        self.persist_state();
        let played = self.position();
        if let Some(mut controller) = self.controller.take() {
            controller.shutdown(played).await;
        }
        if let Some(engine) = self.engine.take() {
            if let Err(err) = engine.shutdown_and_wait(ENGINE_SHUTDOWN_TIMEOUT).await {
                warn!("Engine shutdown: {}", err);
            }
        }
        self.state = PlayerState::ShutDown;
    }
}
