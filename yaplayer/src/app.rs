//! Player event loop
//!
//! Events are handled one at a time, in arrival order, on the task running
//! [`PlayerApp::run`]. Two helper tasks write to the display: the status
//! task clears a status after one second, the progress task refreshes the
//! position while playing.

use crate::display::Display;
use crate::error::{Result, YaPlayerError};
use crate::events::{ArtistQuery, Key, UiEvent};
use crate::player::Player;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use yacatalog::CatalogClient;
use yaconfig::Config;
use yaengine::{EngineLauncher, PlaybackState};
use yasource::Mode;

pub const STATUS_DURATION: Duration = Duration::from_secs(1);
pub const PROGRESS_PERIOD: Duration = Duration::from_millis(500);
pub const VOLUME_STEP: f64 = 0.1;

fn lock<D>(display: &Mutex<D>) -> std::sync::MutexGuard<'_, D> {
    display.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PlayerApp<D: Display + 'static> {
    player: Player,
    display: Arc<Mutex<D>>,
    tx: mpsc::UnboundedSender<UiEvent>,
    rx: mpsc::UnboundedReceiver<UiEvent>,
    status_task: Option<JoinHandle<()>>,
    progress_task: Option<JoinHandle<()>>,
    /// Volume to restore when unmuting
    muted_volume: Option<f64>,
    /// Error that ended the loop, returned by `run`
    failure: Option<YaPlayerError>,
}

impl<D: Display + 'static> PlayerApp<D> {
    pub fn new(
        config: Arc<Config>,
        client: Arc<dyn CatalogClient>,
        launcher: Arc<dyn EngineLauncher>,
        display: Arc<Mutex<D>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            player: Player::new(config, client, launcher, tx.clone()),
            display,
            tx,
            rx,
            status_task: None,
            progress_task: None,
            muted_volume: None,
            failure: None,
        }
    }

    /// Sender for the front-end's events
    pub fn sender(&self) -> mpsc::UnboundedSender<UiEvent> {
        self.tx.clone()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub async fn run(&mut self) -> Result<()> {
        if let Err(err) = self.player.init().await {
            return self.abort_startup(err).await;
        }
        if self.player.mode() == Mode::Artist {
            self.show_status("Search an artist to start");
        } else if let Err(err) = self.player.start().await {
            return self.abort_startup(err).await;
        }
        self.show_mode();
        let volume = self.player.volume();
        lock(&self.display).set_volume(volume);

        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        self.teardown().await;
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn abort_startup(&mut self, err: YaPlayerError) -> Result<()> {
        lock(&self.display).set_status(&err.to_string());
        self.teardown().await;
        Err(err)
    }

    async fn teardown(&mut self) {
        cancel(&mut self.status_task);
        cancel(&mut self.progress_task);
        self.player.shutdown().await;
        info!("Player loop finished");
    }

    /// Handles one event; `false` ends the loop
    pub async fn handle_event(&mut self, event: UiEvent) -> bool {
        debug!(?event, "UI event");
        match event {
            UiEvent::StateChanged(state) => self.on_state_changed(state),
            UiEvent::KeyPressed(key) => return self.on_key(key).await,
            UiEvent::TagsChanged(track) => {
                lock(&self.display).set_title(&track);
                self.show_mode();
            }
            UiEvent::AboutToFinish => self.player.get_next_track().await,
            UiEvent::RepeatToggled(repeat) => {
                self.show_status(if repeat { "Repeat on" } else { "Repeat off" })
            }
            UiEvent::SourceSettingsUpdated(selection) => {
                if self.player.apply_source_settings(selection).await {
                    self.show_mode();
                }
            }
            UiEvent::Status(text) => self.show_status(&text),
            UiEvent::SkipToPosition(position) => {
                self.player.skip_to_playlist_position(position).await
            }
            UiEvent::Query(query) => self.on_query(query).await,
            UiEvent::Shutdown => return false,
        }
        true
    }

    fn on_state_changed(&mut self, state: PlaybackState) {
        self.player.on_state_changed(state);
        match state {
            PlaybackState::Err => {
                let error = self
                    .player
                    .error()
                    .unwrap_or_else(|| "unknown error".to_string());
                self.show_status(&format!("Player error: {}", error));
                cancel(&mut self.progress_task);
                let _ = self.tx.send(UiEvent::Shutdown);
            }
            PlaybackState::Playing => self.restart_progress(),
            PlaybackState::Paused => cancel(&mut self.progress_task),
            PlaybackState::Ready => {}
        }
    }

    async fn on_key(&mut self, key: Key) -> bool {
        match key {
            Key::Like => {
                if self.player.like_track().await {
                    self.show_status("Liked");
                }
            }
            Key::Skip => self.player.skip().await,
            Key::Forward => self.player.skip_forward().await,
            Key::Back => self.player.skip_back().await,
            Key::PlayAgain => self.player.play_again().await,
            Key::Repeat => self.player.toggle_repeat().await,
            Key::VolumeUp => self.change_volume(VOLUME_STEP).await,
            Key::VolumeDown => self.change_volume(-VOLUME_STEP).await,
            Key::Mute => self.toggle_mute().await,
            Key::PlayPause => match self.player.state() {
                Some(PlaybackState::Playing) => self.player.pause().await,
                _ => self.player.play().await,
            },
            Key::ModeRadio => return self.switch_mode(Mode::Radio).await,
            Key::ModePlaylist => return self.switch_mode(Mode::Playlist).await,
            Key::ModeArtist => return self.switch_mode(Mode::Artist).await,
            Key::ShowSources => {
                let title = format!("{} sources", self.player.mode());
                let sources = self.player.sources_list();
                lock(&self.display).show_choices(&title, &sources);
            }
            Key::ToggleHighRes => {
                let high_res = self.player.toggle_high_res();
                self.show_status(if high_res {
                    "High quality on"
                } else {
                    "High quality off"
                });
            }
            Key::Exit => return false,
        }
        true
    }

    async fn change_volume(&mut self, delta: f64) {
        self.muted_volume = None;
        let volume = (self.player.volume() + delta).clamp(0.0, 1.0);
        self.set_volume(volume).await;
    }

    async fn toggle_mute(&mut self) {
        match self.muted_volume.take() {
            Some(volume) => self.set_volume(volume).await,
            None => {
                self.muted_volume = Some(self.player.volume());
                self.set_volume(0.0).await;
            }
        }
    }

    async fn set_volume(&mut self, volume: f64) {
        self.player.set_volume(volume).await;
        lock(&self.display).set_volume(self.player.volume());
    }

    /// A failed switch leaves no controller: the loop ends
    async fn switch_mode(&mut self, mode: Mode) -> bool {
        match self.player.switch_mode(mode).await {
            Ok(()) => {
                self.show_mode();
                if mode == Mode::Artist && self.player.current_track().is_none() {
                    self.show_status("Search an artist to start");
                }
                true
            }
            Err(err) => {
                self.show_status(&err.to_string());
                self.failure = Some(err);
                false
            }
        }
    }

    async fn on_query(&mut self, query: ArtistQuery) {
        let (title, entries) = match query {
            ArtistQuery::Artists(text) => ("Artists", self.player.query_artists(&text).await),
            ArtistQuery::Albums(artist_id) => ("Albums", self.player.query_albums(&artist_id).await),
            ArtistQuery::Tracks(album_ids) => ("Tracks", self.player.query_tracks(&album_ids).await),
        };
        lock(&self.display).show_choices(title, &entries);
    }

    fn show_mode(&self) {
        let name = self.player.source_name();
        lock(&self.display).set_mode(self.player.mode(), name.as_deref());
    }

    /// Shows `text` for [`STATUS_DURATION`]
    fn show_status(&mut self, text: &str) {
        cancel(&mut self.status_task);
        lock(&self.display).set_status(text);
        if text.is_empty() {
            return;
        }
        let display = self.display.clone();
        self.status_task = Some(tokio::spawn(async move {
            tokio::time::sleep(STATUS_DURATION).await;
            lock(&display).set_status("");
        }));
    }

    fn restart_progress(&mut self) {
        cancel(&mut self.progress_task);
        let Some(dashboard) = self.player.dashboard().cloned() else {
            return;
        };
        let display = self.display.clone();
        self.progress_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_PERIOD);
            loop {
                interval.tick().await;
                lock(&display).set_progress(dashboard.position(), dashboard.duration());
            }
        }));
    }
}

fn cancel(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
