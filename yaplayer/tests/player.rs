//! Player against an in-memory catalog and an in-process engine

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use yacatalog::testing::{Call, MockCatalog, batch, station, track};
use yacatalog::{Album, CatalogClient, RotorFeedback, RotorSettings};
use yaconfig::Config;
use yaengine::{EngineLauncher, InProcessLauncher, PlaybackState};
use yaplayer::{Player, PlayerConfigExt, SourceSelection, UiEvent};
use yasource::{Mode, SourceConfigExt, SourceSettings};

fn catalog() -> MockCatalog {
    let wave = station("user", "onyourwave", "Моя волна");
    let rock = station("genre", "rock", "Rock");
    MockCatalog::new()
        .with_dashboard(vec![wave.clone()])
        .with_stations(vec![wave, rock])
        .with_batches(
            "user:onyourwave",
            vec![batch("b1", vec![track("t1", "One", 20), track("t2", "Two", 30), track("t3", "Three", 40)])],
        )
        .with_batches("genre:rock", vec![batch("r1", vec![track("t7", "Seven", 60)])])
        .with_liked(vec![track("l1", "Liked", 50), track("l2", "Liked too", 50)])
        .with_artist(
            "42",
            "Kino",
            vec![(
                Album {
                    id: "a".into(),
                    title: "Zvezda".into(),
                    year: Some(1989),
                    track_count: None,
                },
                vec![track("a1", "Zvezda", 200)],
            )],
        )
}

fn config() -> (TempDir, Arc<Config>) {
    let dir = TempDir::new().unwrap();
    let config = Config::load_config(Some(dir.path())).unwrap();
    config.set_api_retry_delay_ms(1).unwrap();
    (dir, Arc::new(config))
}

fn player(
    config: Arc<Config>,
    mock: Arc<MockCatalog>,
) -> (Player, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client: Arc<dyn CatalogClient> = mock;
    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(InProcessLauncher::new(Duration::from_millis(500)));
    (Player::new(config, client, launcher, tx), rx)
}

fn stream(track_id: &str) -> String {
    format!("https://stream.test/{}/mp3/320", track_id)
}

/// Skips events until one matches
async fn wait_for_event(
    rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    predicate: impl Fn(&UiEvent) -> bool,
) -> UiEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never came")
}

async fn wait_for_uri(player: &Player, uri: &str) {
    for _ in 0..100 {
        if player.uri().as_deref() == Some(uri) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("engine never loaded {} (at {:?})", uri, player.uri());
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_plays_first_station_track() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, mut rx) = player(config, mock);

    player.init().await.unwrap();
    assert!(player.state().is_none());
    player.start().await.unwrap();

    let event = wait_for_event(&mut rx, |e| matches!(e, UiEvent::TagsChanged(_))).await;
    assert!(matches!(event, UiEvent::TagsChanged(track) if track.id == "t1"));
    wait_for_event(&mut rx, |e| *e == UiEvent::StateChanged(PlaybackState::Playing)).await;
    wait_for_uri(&player, &stream("t1")).await;
    assert_eq!(player.source_name().as_deref(), Some("Моя волна"));
    assert_eq!(player.duration(), 20.0);

    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_about_to_finish_enqueues_next() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, mut rx) = player(config, mock.clone());
    player.init().await.unwrap();
    player.start().await.unwrap();

    wait_for_event(&mut rx, |e| *e == UiEvent::AboutToFinish).await;
    player.get_next_track().await;
    assert_eq!(player.current_track().map(|t| t.id.as_str()), Some("t2"));
    wait_for_uri(&player, &stream("t2")).await;

    settle().await;
    assert!(mock.calls().iter().any(|c| matches!(
        c,
        Call::Feedback { feedback: RotorFeedback::TrackFinished { track_id, .. }, .. } if track_id == "t1"
    )));
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_skip_reports_played_time() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, _rx) = player(config, mock.clone());
    player.init().await.unwrap();
    player.start().await.unwrap();
    wait_for_uri(&player, &stream("t1")).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    player.skip().await;
    wait_for_uri(&player, &stream("t2")).await;

    settle().await;
    let skips: Vec<f64> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Feedback {
                feedback: RotorFeedback::Skip { total_played_seconds, .. },
                ..
            } => Some(total_played_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(skips.len(), 1);
    assert!(skips[0] > 0.0);
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_like_failure_is_contained() {
    let mock = Arc::new(catalog().failing_like());
    let (_dir, config) = config();
    let (mut player, mut rx) = player(config, mock);
    player.init().await.unwrap();
    player.start().await.unwrap();

    assert!(!player.like_track().await);
    assert_eq!(player.current_track().and_then(|t| t.liked), Some(false));
    let status = wait_for_event(&mut rx, |e| matches!(e, UiEvent::Status(_))).await;
    assert!(matches!(status, UiEvent::Status(text) if text.contains("like_track")));
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_like_marks_current_track() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, _rx) = player(config, mock.clone());
    player.init().await.unwrap();
    player.start().await.unwrap();
    assert_eq!(player.current_track().and_then(|t| t.liked), Some(false));

    assert!(player.like_track().await);
    assert_eq!(player.current_track().and_then(|t| t.liked), Some(true));
    assert_eq!(mock.count(|c| *c == Call::Like("t1".into())), 1);
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_station_settings_sent_once() {
    let mock = Arc::new(catalog());
    let (dir, config) = config();
    let (mut player, _rx) = player(config, mock.clone());
    player.init().await.unwrap();
    player.start().await.unwrap();

    let settings = RotorSettings {
        language: "russian".into(),
        diversity: "default".into(),
        mood_energy: "calm".into(),
    };
    let calm = SourceSelection::new("onyourwave")
        .with_settings(SourceSettings::Station(settings.clone()));
    assert!(player.apply_source_settings(calm.clone()).await);
    assert!(player.apply_source_settings(calm).await);
    assert_eq!(mock.count(|c| matches!(c, Call::Settings(..))), 2);

    // accepted settings are on disk before shutdown
    let reloaded = Config::load_config(Some(dir.path())).unwrap();
    assert_eq!(reloaded.get_station_settings("onyourwave"), Some(settings));
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_switch_station() {
    let mock = Arc::new(catalog());
    let (dir, config) = config();
    let (mut player, _rx) = player(config.clone(), mock);
    player.init().await.unwrap();
    player.start().await.unwrap();

    assert!(player.apply_source_settings(SourceSelection::new("rock")).await);
    assert_eq!(player.source_id().as_deref(), Some("rock"));
    wait_for_uri(&player, &stream("t7")).await;
    assert_eq!(config.get_source_id(Mode::Radio).as_deref(), Some("rock"));
    let reloaded = Config::load_config(Some(dir.path())).unwrap();
    assert_eq!(reloaded.get_source_id(Mode::Radio).as_deref(), Some("rock"));

    assert!(!player.apply_source_settings(SourceSelection::new("jazz")).await);
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_switch_mode_reuses_engine() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, _rx) = player(config, mock.clone());
    player.init().await.unwrap();
    player.start().await.unwrap();
    wait_for_uri(&player, &stream("t1")).await;

    player.switch_mode(Mode::Playlist).await.unwrap();
    assert_eq!(player.mode(), Mode::Playlist);
    assert_eq!(player.source_name().as_deref(), Some("Моя коллекция"));
    wait_for_uri(&player, &stream("l1")).await;

    // started and ended reports for the radio track
    settle().await;
    let t1_reports = mock.count(|c| matches!(c, Call::PlayAudio(play) if play.track_id == "t1"));
    assert_eq!(t1_reports, 2);

    // same mode: nothing happens
    player.switch_mode(Mode::Playlist).await.unwrap();
    assert_eq!(mock.count(|c| matches!(c, Call::LikedTracks)), 1);
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_playlist_position_only_in_playlist_modes() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    let (mut player, mut rx) = player(config, mock);
    player.init().await.unwrap();
    player.start().await.unwrap();

    player.skip_to_playlist_position(1).await;
    let status = wait_for_event(&mut rx, |e| matches!(e, UiEvent::Status(_))).await;
    assert!(matches!(status, UiEvent::Status(text) if text.contains("not supported")));

    player.switch_mode(Mode::Playlist).await.unwrap();
    player.skip_to_playlist_position(1).await;
    assert_eq!(player.playlist_position(), 1);
    wait_for_uri(&player, &stream("l2")).await;
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_artist_mode_waits_for_selection() {
    let mock = Arc::new(catalog());
    let (_dir, config) = config();
    config.set_mode(Mode::Artist).unwrap();
    let (mut player, _rx) = player(config, mock);
    player.init().await.unwrap();
    assert_eq!(player.mode(), Mode::Artist);

    assert_eq!(player.query_artists("kin").await.len(), 1);
    assert_eq!(player.query_albums("42").await.len(), 1);
    assert!(player.uri().is_none());

    let selection = SourceSelection::new("42").with_settings(SourceSettings::Artist {
        album_ids: vec!["a".into()],
    });
    assert!(player.apply_source_settings(selection).await);
    wait_for_uri(&player, &stream("a1")).await;
    assert_eq!(player.source_name().as_deref(), Some("Kino"));
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_restart() {
    let mock = Arc::new(catalog());
    let (dir, config) = config();
    let (mut player, _rx) = player(config, mock);
    player.init().await.unwrap();
    player.start().await.unwrap();

    player.set_volume(0.8).await;
    assert!(!player.toggle_high_res());
    player.switch_mode(Mode::Playlist).await.unwrap();
    player.shutdown().await;

    let reloaded = Config::load_config(Some(dir.path())).unwrap();
    assert_eq!(reloaded.get_mode(), Mode::Playlist);
    assert_eq!(reloaded.get_volume(), 0.8);
    assert!(!reloaded.get_high_res());
    assert_eq!(reloaded.get_source_id(Mode::Radio).as_deref(), Some("onyourwave"));
    assert_eq!(reloaded.get_source_id(Mode::Playlist).as_deref(), Some("my_likes"));
}
