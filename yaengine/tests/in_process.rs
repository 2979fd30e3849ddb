//! Engine driven through its handle, over in-memory pipes

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use yaengine::{
    Dashboard, ENGINE_EXITED, EngineCommand, EngineEvent, EngineExit, EngineHandle,
    EngineLauncher, InProcessLauncher, LaunchedEngine, PlaybackState,
};

const TICK: Duration = Duration::from_millis(500);

async fn spawn() -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = EngineHandle::spawn(&InProcessLauncher::new(TICK), tx)
        .await
        .unwrap();
    (handle, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("no engine event")
        .expect("event channel closed")
}

async fn wait_until(dashboard: &Dashboard, predicate: impl Fn(&Dashboard) -> bool) {
    for _ in 0..600 {
        if predicate(dashboard) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("dashboard never matched: {:?}", dashboard.snapshot());
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_starts_playback() {
    let (mut engine, mut rx) = spawn().await;
    engine.enqueue("https://stream.test/a", Some(30.0)).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::StateChanged(PlaybackState::Playing)
    );
    let dashboard = engine.dashboard().clone();
    wait_until(&dashboard, |d| d.position() >= 5.0).await;
    assert_eq!(dashboard.uri().as_deref(), Some("https://stream.test/a"));
    assert_eq!(dashboard.duration(), 30.0);

    engine.command(EngineCommand::SetVolume(0.25)).await.unwrap();
    wait_until(&dashboard, |d| d.volume() == 0.25).await;

    engine.shutdown_and_wait(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_about_to_finish_and_next_track() {
    let (mut engine, mut rx) = spawn().await;
    engine.enqueue("https://stream.test/a", Some(10.0)).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::StateChanged(PlaybackState::Playing)
    );
    assert_eq!(next_event(&mut rx).await, EngineEvent::AboutToFinish);

    engine.enqueue("https://stream.test/b", Some(10.0)).await.unwrap();
    engine.command(EngineCommand::Play).await.unwrap();
    let dashboard = engine.dashboard().clone();
    wait_until(&dashboard, |d| {
        d.uri().as_deref() == Some("https://stream.test/b")
    })
    .await;
    assert_eq!(dashboard.state(), Some(PlaybackState::Playing));

    engine.shutdown_and_wait(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_repeat_is_mirrored() {
    let (mut engine, mut rx) = spawn().await;
    engine.command(EngineCommand::ToggleRepeat).await.unwrap();
    assert_eq!(next_event(&mut rx).await, EngineEvent::RepeatToggled(true));
    assert!(engine.dashboard().repeat());

    engine.shutdown_and_wait(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_clean_shutdown_is_not_an_error() {
    let (mut engine, mut rx) = spawn().await;
    engine.enqueue("https://stream.test/a", Some(30.0)).await.unwrap();
    next_event(&mut rx).await;
    let dashboard = engine.dashboard().clone();

    engine.shutdown_and_wait(Duration::from_secs(2)).await.unwrap();
    while let Some(event) = rx.recv().await {
        assert_ne!(event, EngineEvent::StateChanged(PlaybackState::Err));
    }
    assert!(dashboard.error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_failure_reaches_player() {
    let (mut engine, mut rx) = spawn().await;
    engine.enqueue("bogus", None).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::StateChanged(PlaybackState::Err)
    );
    // the engine exits on its own; the first error is kept
    assert!(rx.recv().await.is_none());
    let dashboard = engine.dashboard();
    assert_eq!(dashboard.state(), Some(PlaybackState::Err));
    assert_eq!(dashboard.error().as_deref(), Some("Invalid media URI: bogus"));
}

/// An engine whose output closes right away
struct VanishingLauncher;

#[async_trait]
impl EngineLauncher for VanishingLauncher {
    async fn launch(&self) -> yaengine::Result<LaunchedEngine> {
        let (stdin, _engine_in) = tokio::io::duplex(64);
        let (_engine_out, stdout) = tokio::io::duplex(64);
        Ok(LaunchedEngine {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            exit: EngineExit::Task(tokio::spawn(async { Ok(()) })),
        })
    }
}

#[tokio::test]
async fn test_unexpected_exit_is_reported() {
    let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
    let engine = EngineHandle::spawn(&VanishingLauncher, tx).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::StateChanged(PlaybackState::Err)
    );
    assert_eq!(engine.dashboard().error().as_deref(), Some(ENGINE_EXITED));
}
