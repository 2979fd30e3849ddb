//! Controller scenarios against an in-memory catalog

use std::sync::Arc;
use tempfile::TempDir;
use yacatalog::testing::{Call, MockCatalog, batch, station, track};
use yacatalog::{Album, CatalogClient, RotorFeedback, RotorSettings};
use yaconfig::Config;
use yasource::{
    ArtistController, ControllerError, MY_LIKES_ID, PlaylistController, SourceConfigExt,
    SourceController, SourceSettings, StationController,
};

fn config() -> (TempDir, Arc<Config>) {
    let dir = TempDir::new().unwrap();
    let config = Config::load_config(Some(dir.path())).unwrap();
    config.set_api_retry_delay_ms(1).unwrap();
    (dir, Arc::new(config))
}

/// Lets the background report tasks run
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn radio_catalog() -> MockCatalog {
    let wave = station("user", "onyourwave", "Моя волна ");
    let rock = station("genre", "rock", "Rock");
    MockCatalog::new()
        .with_dashboard(vec![wave.clone()])
        .with_stations(vec![wave, rock])
        .with_batches(
            "user:onyourwave",
            vec![
                batch("b1", vec![track("t1", "One", 180), track("t2", "Two", 200), track("t3", "Three", 240)]),
                batch("b2", vec![track("t4", "Four", 100), track("t5", "Five", 100)]),
            ],
        )
        .with_batches("genre:rock", vec![batch("r1", vec![track("t7", "Seven", 300)])])
}

async fn tuned_station(mock: Arc<MockCatalog>) -> (TempDir, StationController) {
    let (dir, config) = config();
    let client: Arc<dyn CatalogClient> = mock;
    let mut controller = StationController::new(client, config);
    controller.initialize().await.unwrap();
    (dir, controller)
}

#[tokio::test]
async fn test_station_list_is_deduplicated() {
    let mock = Arc::new(radio_catalog());
    let (_dir, controller) = tuned_station(mock).await;

    let sources = controller.get_sources_list();
    let ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["onyourwave", "rock"]);
    assert_eq!(sources[0].name, "Моя волна");
}

#[tokio::test]
async fn test_batch_exhaustion_fetches_once() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;

    let first = controller.set_source(None, None, 0.0).await.unwrap();
    assert_eq!(first.id, "t1");
    assert_eq!(controller.batch_index(), 0);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let track = controller.get_next_track(0.0).await.unwrap();
        seen.push((track.id, controller.batch_index()));
    }
    assert_eq!(
        seen,
        vec![("t2".to_string(), 1), ("t3".to_string(), 2), ("t4".to_string(), 0)]
    );
    assert_eq!(mock.count(|c| matches!(c, Call::StationTracks(_))), 2);
}

#[tokio::test]
async fn test_settings_sent_once_and_mark_batch_stale() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;
    controller.set_source(None, None, 0.0).await.unwrap();
    // tuning forces the effective settings once
    assert_eq!(mock.count(|c| matches!(c, Call::Settings(..))), 1);

    let calm = SourceSettings::Station(RotorSettings {
        language: "russian".into(),
        diversity: "favorite".into(),
        mood_energy: "calm".into(),
    });
    assert!(controller.apply_source_settings(&calm, false).await.unwrap());
    assert!(controller.apply_source_settings(&calm, false).await.unwrap());
    assert_eq!(mock.count(|c| matches!(c, Call::Settings(..))), 2);
    assert_eq!(controller.get_source_settings(None), Some(calm));

    // the stale batch is replaced even though t2 is left
    let next = controller.get_next_track(3.0).await.unwrap();
    assert_eq!(next.id, "t4");
    assert_eq!(mock.count(|c| matches!(c, Call::StationTracks(_))), 2);
}

#[tokio::test]
async fn test_rejected_settings_are_not_persisted() {
    let mock = Arc::new(radio_catalog().rejecting_settings());
    let (dir, config) = config();
    let client: Arc<dyn CatalogClient> = mock.clone();
    let mut controller = StationController::new(client, config.clone());
    controller.initialize().await.unwrap();

    // tuning still succeeds
    let first = controller.set_source(None, None, 0.0).await.unwrap();
    assert_eq!(first.id, "t1");

    let loud = SourceSettings::Station(RotorSettings {
        language: "any".into(),
        diversity: "discover".into(),
        mood_energy: "active".into(),
    });
    assert!(!controller.apply_source_settings(&loud, false).await.unwrap());
    assert!(config.get_station_settings("onyourwave").is_none());
    drop(dir);
}

#[tokio::test]
async fn test_switch_reports_previous_track_first() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;
    controller.set_source(None, None, 0.0).await.unwrap();
    settle().await;
    mock.clear_calls();

    let track = controller.set_source(Some("rock"), None, 12.5).await.unwrap();
    assert_eq!(track.id, "t7");
    assert_eq!(controller.source_id().as_deref(), Some("rock"));
    settle().await;

    let reports = mock.reports();
    assert!(reports.len() >= 5, "got {:?}", reports);
    match &reports[0] {
        Call::PlayAudio(play) => {
            assert_eq!(play.track_id, "t1");
            assert_eq!(play.total_played_seconds, 12.5);
        }
        other => panic!("unexpected first report {:?}", other),
    }
    assert_eq!(
        reports[1],
        Call::Feedback {
            station: "user:onyourwave".into(),
            batch_id: Some("b1".into()),
            feedback: RotorFeedback::Skip {
                track_id: "t1".into(),
                total_played_seconds: 12.5,
            },
        }
    );
    assert!(matches!(
        &reports[2],
        Call::Feedback { station, feedback: RotorFeedback::RadioStarted { .. }, .. } if station == "genre:rock"
    ));
    assert!(matches!(&reports[3], Call::PlayAudio(play) if play.track_id == "t7"));
    assert!(matches!(
        &reports[4],
        Call::Feedback { feedback: RotorFeedback::TrackStarted { track_id }, .. } if track_id == "t7"
    ));
}

#[tokio::test]
async fn test_skip_and_finish_feedback() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;
    controller.set_source(None, None, 0.0).await.unwrap();

    controller.get_next_track(5.0).await.unwrap();
    controller.get_next_track(0.0).await.unwrap();
    settle().await;

    let skips = mock.count(|c| {
        matches!(c, Call::Feedback { feedback: RotorFeedback::Skip { .. }, .. })
    });
    assert_eq!(skips, 1);
    assert!(mock.calls().iter().any(|c| matches!(
        c,
        Call::Feedback {
            feedback: RotorFeedback::TrackFinished { track_id, total_played_seconds },
            ..
        } if track_id == "t2" && *total_played_seconds == 200.0
    )));
}

#[tokio::test]
async fn test_unknown_station_and_empty_batch() {
    let mock = Arc::new(
        radio_catalog().with_batches("genre:rock", vec![batch("r0", Vec::new())]),
    );
    let (_dir, mut controller) = tuned_station(mock).await;

    assert!(matches!(
        controller.set_source(Some("jazz"), None, 0.0).await,
        Err(ControllerError::UnknownSource(tag)) if tag == "jazz"
    ));
    assert!(matches!(
        controller.set_source(Some("rock"), None, 0.0).await,
        Err(ControllerError::EmptyBatch(station)) if station == "genre:rock"
    ));
}

#[tokio::test]
async fn test_stream_quality_follows_high_res() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock).await;

    let first = controller.set_source(None, None, 0.0).await.unwrap();
    assert_eq!(first.uri.as_deref(), Some("https://stream.test/t1/mp3/320"));

    controller.set_high_res(false);
    let next = controller.get_next_track(0.0).await.unwrap();
    assert_eq!(next.uri.as_deref(), Some("https://stream.test/t2/mp3/128"));
}

#[tokio::test]
async fn test_station_end_to_end() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;

    controller.set_source(None, None, 0.0).await.unwrap();
    let mut indices = vec![controller.batch_index()];
    for _ in 0..3 {
        controller.get_next_track(0.0).await.unwrap();
        indices.push(controller.batch_index());
    }
    assert_eq!(indices, vec![0, 1, 2, 0]);
    settle().await;

    let finished: Vec<String> = mock
        .reports()
        .into_iter()
        .filter_map(|c| match c {
            Call::Feedback {
                feedback: RotorFeedback::TrackFinished { track_id, .. },
                ..
            } => Some(track_id),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec!["t1", "t2", "t3"]);
    let started_batches = mock.count(|c| {
        matches!(c, Call::Feedback { feedback: RotorFeedback::RadioStarted { .. }, .. })
    });
    assert_eq!(started_batches, 2);

    mock.clear_calls();
    controller.set_source(Some("rock"), None, 5.0).await.unwrap();
    settle().await;
    let skips: Vec<Call> = mock
        .reports()
        .into_iter()
        .filter(|c| matches!(c, Call::Feedback { feedback: RotorFeedback::Skip { .. }, .. }))
        .collect();
    assert_eq!(skips.len(), 1);
    assert!(matches!(
        &skips[0],
        Call::Feedback { feedback: RotorFeedback::Skip { track_id, total_played_seconds }, .. }
            if track_id == "t4" && *total_played_seconds == 5.0
    ));
}

#[tokio::test]
async fn test_like_track() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;
    assert!(matches!(
        controller.like_track().await,
        Err(ControllerError::NoTracks)
    ));

    controller.set_source(None, None, 0.0).await.unwrap();
    assert!(controller.like_track().await.unwrap());
    assert_eq!(mock.count(|c| *c == Call::Like("t1".into())), 1);
}

#[tokio::test]
async fn test_like_failure_is_reported() {
    let mock = Arc::new(radio_catalog().failing_like());
    let (_dir, mut controller) = tuned_station(mock).await;
    controller.set_source(None, None, 0.0).await.unwrap();

    match controller.like_track().await {
        Err(ControllerError::Remote { call, .. }) => assert_eq!(call, "like_track"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_station_shutdown_sends_final_reports() {
    let mock = Arc::new(radio_catalog());
    let (_dir, mut controller) = tuned_station(mock.clone()).await;
    controller.set_source(None, None, 0.0).await.unwrap();

    controller.shutdown(30.0).await;
    let calls = mock.calls();
    assert!(calls.iter().any(|c| matches!(
        c,
        Call::PlayAudio(play) if play.track_id == "t1" && play.total_played_seconds == 30.0
    )));
    assert!(calls.iter().any(|c| matches!(
        c,
        Call::Feedback { feedback: RotorFeedback::Skip { total_played_seconds, .. }, .. }
            if *total_played_seconds == 30.0
    )));
}

fn playlist_catalog() -> MockCatalog {
    MockCatalog::new()
        .with_liked(vec![
            track("l1", "Liked one", 120),
            track("l2", "Liked two", 130),
            track("l3", "Liked three", 140),
        ])
        .with_playlist("1001", "Road", vec![track("p1", "Road one", 150), track("p2", "Road two", 160)])
}

async fn playlist_controller(mock: Arc<MockCatalog>) -> (TempDir, PlaylistController) {
    let (dir, config) = config();
    let client: Arc<dyn CatalogClient> = mock;
    let mut controller = PlaylistController::new(client, config);
    controller.initialize().await.unwrap();
    (dir, controller)
}

#[tokio::test]
async fn test_playlist_sources_start_with_likes() {
    let (_dir, controller) = playlist_controller(Arc::new(playlist_catalog())).await;
    let ids: Vec<String> = controller
        .get_sources_list()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![MY_LIKES_ID.to_string(), "1001".to_string()]);
}

#[tokio::test]
async fn test_playlist_fallback_when_listing_fails() {
    let mock = Arc::new(playlist_catalog().failing_playlists());
    let (_dir, controller) = playlist_controller(mock).await;
    let sources = controller.get_sources_list();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, MY_LIKES_ID);
}

#[tokio::test]
async fn test_playlist_wraps_around() {
    let (_dir, mut controller) = playlist_controller(Arc::new(playlist_catalog())).await;
    let first = controller.set_source(None, None, 0.0).await.unwrap();
    assert_eq!(first.id, "l1");
    assert_eq!(controller.get_short_playlist().len(), 3);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(controller.get_next_track(0.0).await.unwrap().id);
    }
    assert_eq!(ids, vec!["l2", "l3", "l1"]);
    assert_eq!(controller.get_playlist_position(), 0);
}

#[tokio::test]
async fn test_playlist_position_bounds() {
    let (_dir, mut controller) = playlist_controller(Arc::new(playlist_catalog())).await;
    controller.set_source(Some("1001"), None, 0.0).await.unwrap();
    assert_eq!(controller.source_name().as_deref(), Some("Road"));

    assert!(matches!(
        controller.set_playlist_position(5, 0.0).await,
        Err(ControllerError::PositionOutOfBounds { position: 5, len: 2 })
    ));
    let track = controller.set_playlist_position(1, 4.0).await.unwrap();
    assert_eq!(track.id, "p2");
    assert_eq!(controller.get_playlist_position(), 1);
}

#[tokio::test]
async fn test_empty_likes_have_no_tracks() {
    let (_dir, mut controller) = playlist_controller(Arc::new(MockCatalog::new())).await;
    assert!(matches!(
        controller.set_source(None, None, 0.0).await,
        Err(ControllerError::NoTracks)
    ));
    assert!(matches!(
        controller.set_source(Some("missing"), None, 0.0).await,
        Err(ControllerError::UnknownSource(_))
    ));
}

#[tokio::test]
async fn test_playlist_has_no_artist_queries() {
    let (_dir, mut controller) = playlist_controller(Arc::new(playlist_catalog())).await;
    assert!(matches!(
        controller.query_artists("kino").await,
        Err(ControllerError::NotSupported(_))
    ));
}

fn album(id: &str, title: &str, year: u32) -> Album {
    Album {
        id: id.to_string(),
        title: title.to_string(),
        year: Some(year),
        track_count: None,
    }
}

fn artist_catalog() -> MockCatalog {
    MockCatalog::new().with_artist(
        "42",
        "Kino",
        vec![
            (
                album("a", "Zvezda", 1989),
                vec![track("a1", "Zvezda", 200), track("a2", "Pachka sigaret", 260)],
            ),
            (album("b", "Nachalnik", 1985), vec![track("b1", "Transformator", 190)]),
        ],
    )
}

async fn artist_controller(mock: Arc<MockCatalog>) -> (TempDir, ArtistController) {
    let (dir, config) = config();
    let client: Arc<dyn CatalogClient> = mock;
    let mut controller = ArtistController::new(client, config);
    controller.initialize().await.unwrap();
    (dir, controller)
}

#[tokio::test]
async fn test_artist_drill_down() {
    let (_dir, mut controller) = artist_controller(Arc::new(artist_catalog())).await;
    assert!(!controller.has_tracks());

    let artists = controller.query_artists("kin").await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Kino (rock) [2 albums]");

    let albums = controller.query_albums("42").await.unwrap();
    let labels: Vec<&str> = albums.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(labels, vec!["(1985)-Nachalnik", "(1989)-Zvezda"]);

    let tracks = controller
        .query_tracks(&["b".to_string(), "a".to_string()])
        .await
        .unwrap();
    assert_eq!(tracks.len(), 3);
    assert!(controller.has_tracks());

    let first = controller.set_source(Some("42"), None, 0.0).await.unwrap();
    assert_eq!(first.id, "b1");
    assert_eq!(controller.source_name().as_deref(), Some("Kino"));
    assert_eq!(
        controller.get_source_settings(None),
        Some(SourceSettings::Artist {
            album_ids: vec!["b".to_string(), "a".to_string()]
        })
    );
    assert_eq!(controller.get_next_track(0.0).await.unwrap().id, "a1");
}

#[tokio::test]
async fn test_artist_settings_select_albums() {
    let (_dir, mut controller) = artist_controller(Arc::new(artist_catalog())).await;
    let settings = SourceSettings::Artist {
        album_ids: vec!["a".to_string()],
    };
    let first = controller
        .set_source(Some("42"), Some(settings), 0.0)
        .await
        .unwrap();
    assert_eq!(first.id, "a1");
    assert_eq!(controller.get_short_playlist().len(), 2);
}

#[tokio::test]
async fn test_artist_without_selection_has_no_tracks() {
    let (_dir, mut controller) = artist_controller(Arc::new(artist_catalog())).await;
    assert!(matches!(
        controller.set_source(None, None, 0.0).await,
        Err(ControllerError::NoTracks)
    ));
}
