use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use yacatalog::testing::{MockCatalog, batch, station, track};
use yacatalog::{CatalogClient, SourceEntry};
use yaconfig::Config;
use yaengine::{EngineLauncher, InProcessLauncher, PlaybackState};
use yaplayer::{ArtistQuery, Display, Key, PlayerApp, PlayerConfigExt, UiEvent, YaPlayerError};
use yasource::{Mode, Track};

#[derive(Default)]
struct RecordingDisplay {
    titles: Vec<String>,
    statuses: Vec<String>,
    modes: Vec<(Mode, Option<String>)>,
    volumes: Vec<f64>,
    choices: Vec<(String, Vec<SourceEntry>)>,
}

impl Display for RecordingDisplay {
    fn set_title(&mut self, track: &Track) {
        self.titles.push(track.to_string());
    }

    fn set_status(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }

    fn set_mode(&mut self, mode: Mode, source_name: Option<&str>) {
        self.modes.push((mode, source_name.map(str::to_string)));
    }

    fn set_progress(&mut self, _position: f64, _duration: f64) {}

    fn set_volume(&mut self, volume: f64) {
        self.volumes.push(volume);
    }

    fn show_choices(&mut self, title: &str, choices: &[SourceEntry]) {
        self.choices.push((title.to_string(), choices.to_vec()));
    }
}

fn catalog() -> MockCatalog {
    let wave = station("user", "onyourwave", "Моя волна");
    MockCatalog::new()
        .with_dashboard(vec![wave.clone()])
        .with_stations(vec![wave])
        .with_batches(
            "user:onyourwave",
            vec![batch("b1", vec![track("t1", "One", 180), track("t2", "Two", 200)])],
        )
        .with_artist("42", "Kino", vec![])
}

fn app(mode: Mode) -> (TempDir, PlayerApp<RecordingDisplay>, Arc<Mutex<RecordingDisplay>>) {
    let dir = TempDir::new().unwrap();
    let config = Config::load_config(Some(dir.path())).unwrap();
    config.set_api_retry_delay_ms(1).unwrap();
    config.set_mode(mode).unwrap();

    let client: Arc<dyn CatalogClient> = Arc::new(catalog());
    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(InProcessLauncher::new(Duration::from_millis(500)));
    let display = Arc::new(Mutex::new(RecordingDisplay::default()));
    let app = PlayerApp::new(Arc::new(config), client, launcher, display.clone());
    (dir, app, display)
}

#[tokio::test(start_paused = true)]
async fn test_volume_keys_and_exit() {
    let (_dir, mut app, display) = app(Mode::Radio);
    let events = app.sender();
    for key in [Key::VolumeUp, Key::VolumeUp, Key::Mute, Key::Mute, Key::Exit] {
        events.send(UiEvent::KeyPressed(key)).unwrap();
    }

    app.run().await.unwrap();

    let display = display.lock().unwrap();
    let volumes = &display.volumes;
    assert_eq!(volumes.len(), 5);
    assert!((volumes[0] - 0.5).abs() < 1e-9);
    assert!((volumes[2] - 0.7).abs() < 1e-9);
    assert_eq!(volumes[3], 0.0);
    assert!((volumes[4] - 0.7).abs() < 1e-9);
    assert_eq!(
        display.modes.last(),
        Some(&(Mode::Radio, Some("Моя волна".to_string())))
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_is_cleared() {
    let (_dir, mut app, display) = app(Mode::Radio);
    let events = app.sender();
    events.send(UiEvent::Status("hello".into())).unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = events.send(UiEvent::KeyPressed(Key::Exit));
    });

    app.run().await.unwrap();

    let display = display.lock().unwrap();
    let shown = display.statuses.iter().position(|s| s == "hello").unwrap();
    assert_eq!(display.statuses.get(shown + 1).map(String::as_str), Some(""));
    assert_eq!(display.titles, vec!["Kino - One (3:00)".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_ends_loop() {
    let (_dir, mut app, display) = app(Mode::Radio);
    app.sender()
        .send(UiEvent::StateChanged(PlaybackState::Err))
        .unwrap();

    // no Exit key: the error alone stops the loop
    app.run().await.unwrap();

    let display = display.lock().unwrap();
    assert!(display.statuses.iter().any(|s| s.starts_with("Player error")));
}

#[tokio::test(start_paused = true)]
async fn test_artist_mode_shows_search_results() {
    let (_dir, mut app, display) = app(Mode::Artist);
    let events = app.sender();
    events
        .send(UiEvent::Query(ArtistQuery::Artists("kin".into())))
        .unwrap();
    events.send(UiEvent::KeyPressed(Key::Exit)).unwrap();

    app.run().await.unwrap();

    let display = display.lock().unwrap();
    assert!(display.titles.is_empty());
    assert!(display.statuses.iter().any(|s| s == "Search an artist to start"));
    let (title, entries) = &display.choices[0];
    assert_eq!(title, "Artists");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "42");
}

#[tokio::test(start_paused = true)]
async fn test_failed_mode_switch_ends_loop() {
    // no liked tracks: the playlist controller has nothing to play
    let (_dir, mut app, display) = app(Mode::Radio);
    let events = app.sender();
    events.send(UiEvent::KeyPressed(Key::ModePlaylist)).unwrap();
    events.send(UiEvent::KeyPressed(Key::Skip)).unwrap();

    let result = app.run().await;

    assert!(matches!(
        result,
        Err(YaPlayerError::ModeSwitch { mode: Mode::Playlist, .. })
    ));
    let display = display.lock().unwrap();
    assert!(
        display
            .statuses
            .iter()
            .any(|s| s.starts_with("Cannot switch to playlist mode"))
    );
}
