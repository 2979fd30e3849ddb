//! Engine state machine and tick loop
//!
//! Requests read from stdin are queued and only applied on the next tick.
//! Each tick then polls the pipeline, dequeues media when the player is
//! idle and publishes the dashboard followed by the tick's events.

use crate::dashboard::{DashboardSnapshot, DashboardWriter, PlaybackState};
use crate::error::PipelineError;
use crate::pipeline::{MediaPipeline, PipelineEvent};
use crate::protocol::{EngineCommand, EngineEvent, EngineMessage, EngineRequest, decode, encode};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, warn};

/// Step of `skip_forward` / `skip_back`, as a fraction of the duration
pub const SKIP_RATIO: f64 = 0.05;
/// `set_position` is ignored this close to the end
pub const SEEK_GUARD_RATIO: f64 = 0.01;
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
struct QueuedMedia {
    uri: String,
    duration_hint: Option<f64>,
}

pub struct Engine<P: MediaPipeline> {
    pipeline: P,
    dashboard: DashboardWriter,
    queue: VecDeque<QueuedMedia>,
    current: Option<QueuedMedia>,
    repeat: bool,
    /// The next queued media may be loaded
    wants_media: bool,
    about_to_finish_sent: bool,
    shutdown: bool,
    events: Vec<EngineEvent>,
}

impl<P: MediaPipeline> Engine<P> {
    pub fn new(pipeline: P) -> Self {
        let mut dashboard = DashboardWriter::new(pipeline.volume());
        dashboard.set_state(pipeline.state());
        Self {
            pipeline,
            dashboard,
            queue: VecDeque::new(),
            current: None,
            repeat: false,
            wants_media: true,
            about_to_finish_sent: false,
            shutdown: false,
            events: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        self.dashboard.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Applies `requests`, polls the pipeline and returns the messages to
    /// publish
    pub fn tick(&mut self, requests: impl IntoIterator<Item = EngineRequest>) -> Vec<EngineMessage> {
        if let Err(err) = self.step(requests) {
            self.fail(err);
        }
        self.sync_dashboard();

        let mut messages = vec![EngineMessage::Dashboard {
            snapshot: self.dashboard.snapshot().clone(),
        }];
        messages.extend(self.events.drain(..).map(EngineMessage::from));
        messages
    }

    fn step(
        &mut self,
        requests: impl IntoIterator<Item = EngineRequest>,
    ) -> Result<(), PipelineError> {
        for request in requests {
            if self.shutdown {
                break;
            }
            match request {
                EngineRequest::Command { command } => self.handle_command(command)?,
                EngineRequest::Enqueue { uri, duration_hint } => {
                    debug!(uri = %uri, "Media enqueued");
                    self.queue.push_back(QueuedMedia { uri, duration_hint });
                }
            }
        }
        if self.shutdown {
            return Ok(());
        }

        for event in self.pipeline.poll_events() {
            self.handle_pipeline_event(event)?;
        }

        if self.wants_media {
            if let Some(media) = self.queue.pop_front() {
                self.load(media)?;
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, command: EngineCommand) -> Result<(), PipelineError> {
        debug!(?command, "Engine command");
        match command {
            EngineCommand::Play => {
                if self.current.is_some() && self.pipeline.state() != PlaybackState::Playing {
                    self.pipeline.set_state(PlaybackState::Playing)?;
                }
            }
            EngineCommand::Pause => {
                if self.pipeline.state() == PlaybackState::Playing {
                    self.pipeline.set_state(PlaybackState::Paused)?;
                }
            }
            EngineCommand::Stop => self.pipeline.set_state(PlaybackState::Ready)?,
            EngineCommand::PlayAgain => {
                if self.current.is_some() {
                    self.pipeline.seek(0.0)?;
                    self.about_to_finish_sent = false;
                    self.pipeline.set_state(PlaybackState::Playing)?;
                }
            }
            EngineCommand::ToggleRepeat => {
                self.repeat = !self.repeat;
                self.dashboard.set_repeat(self.repeat);
                self.events.push(EngineEvent::RepeatToggled(self.repeat));
            }
            EngineCommand::SkipNext => {
                if self.repeat {
                    // leave the loop and let the player provide a track
                    self.repeat = false;
                    self.dashboard.set_repeat(false);
                    self.events.push(EngineEvent::RepeatToggled(false));
                    self.events.push(EngineEvent::AboutToFinish);
                }
                self.pipeline.set_state(PlaybackState::Ready)?;
                self.wants_media = true;
            }
            EngineCommand::SkipForward => self.skip_by(SKIP_RATIO)?,
            EngineCommand::SkipBack => self.skip_by(-SKIP_RATIO)?,
            EngineCommand::SetPosition(position) => self.set_position(position)?,
            EngineCommand::SetVolume(volume) => {
                let volume = volume.clamp(0.0, 1.0);
                self.pipeline.set_volume(volume);
                self.dashboard.set_volume(volume);
            }
            EngineCommand::Shutdown => {
                info!("Engine shutdown requested");
                self.pipeline.set_state(PlaybackState::Ready)?;
                self.shutdown = true;
            }
        }
        Ok(())
    }

    fn skip_by(&mut self, ratio: f64) -> Result<(), PipelineError> {
        match self.pipeline.duration() {
            Some(duration) => self.set_position(self.pipeline.position() + duration * ratio),
            None => Ok(()),
        }
    }

    fn set_position(&mut self, position: f64) -> Result<(), PipelineError> {
        if self.current.is_none() {
            return Ok(());
        }
        if let Some(duration) = self.pipeline.duration() {
            if position >= duration * (1.0 - SEEK_GUARD_RATIO) {
                debug!(position, duration, "Seek too close to the end, ignored");
                return Ok(());
            }
        }
        self.pipeline.seek(position.max(0.0))
    }

    fn handle_pipeline_event(&mut self, event: PipelineEvent) -> Result<(), PipelineError> {
        match event {
            PipelineEvent::AboutToFinish => {
                if !self.repeat && !self.about_to_finish_sent {
                    self.about_to_finish_sent = true;
                    self.events.push(EngineEvent::AboutToFinish);
                }
            }
            PipelineEvent::Eos => {
                if self.repeat {
                    debug!("Replaying current media");
                    self.pipeline.seek(0.0)?;
                    self.pipeline.set_state(PlaybackState::Playing)?;
                } else {
                    self.pipeline.set_state(PlaybackState::Ready)?;
                    self.wants_media = true;
                }
            }
            PipelineEvent::Error(message) => return Err(PipelineError::Failed(message)),
            // picked up by sync_dashboard
            PipelineEvent::StateChanged(_) => {}
        }
        Ok(())
    }

    fn load(&mut self, media: QueuedMedia) -> Result<(), PipelineError> {
        info!(uri = %media.uri, "Loading media");
        self.pipeline.set_uri(&media.uri, media.duration_hint)?;
        self.pipeline.set_state(PlaybackState::Playing)?;
        self.dashboard.set_uri(Some(media.uri.clone()));
        self.current = Some(media);
        self.wants_media = false;
        self.about_to_finish_sent = false;
        Ok(())
    }

    fn fail(&mut self, err: PipelineError) {
        error!("Pipeline error: {}", err);
        self.dashboard.set_error(err.to_string());
        if self.dashboard.set_state(PlaybackState::Err) {
            self.events.push(EngineEvent::StateChanged(PlaybackState::Err));
        }
        self.shutdown = true;
    }

    fn sync_dashboard(&mut self) {
        if self.dashboard.snapshot().state == Some(PlaybackState::Err) {
            return;
        }
        let state = self.pipeline.state();
        if self.dashboard.set_state(state) {
            self.events.push(EngineEvent::StateChanged(state));
        }
        self.dashboard.set_position(self.pipeline.position());
        self.dashboard
            .set_duration(self.pipeline.duration().unwrap_or(0.0));
        self.dashboard.set_volume(self.pipeline.volume());
    }
}

async fn publish<W>(
    sink: &mut FramedWrite<W, LinesCodec>,
    messages: Vec<EngineMessage>,
) -> Result<(), crate::EngineError>
where
    W: AsyncWrite + Unpin,
{
    for message in messages {
        sink.send(encode(&message)?).await?;
    }
    Ok(())
}

/// Runs the engine until `shutdown` or a pipeline failure
///
/// Closing `reader` counts as a shutdown request.
pub async fn run_engine<R, W, P>(
    reader: R,
    writer: W,
    pipeline: P,
    tick: Duration,
) -> Result<(), crate::EngineError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    P: MediaPipeline,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new());
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    let mut engine = Engine::new(pipeline);
    let mut pending: Vec<EngineRequest> = Vec::new();
    let mut input_open = true;

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(tick_ms = tick.as_millis() as u64, "Engine started");
    loop {
        tokio::select! {
            line = lines.next(), if input_open => match line {
                Some(Ok(line)) if line.trim().is_empty() => {}
                Some(Ok(line)) => match decode::<EngineRequest>(&line) {
                    Ok(request) => pending.push(request),
                    Err(err) => warn!("Ignoring malformed request: {}", err),
                },
                Some(Err(err)) => warn!("Cannot read request: {}", err),
                None => {
                    debug!("Engine input closed");
                    input_open = false;
                    pending.push(EngineCommand::Shutdown.into());
                }
            },
            _ = interval.tick() => {
                let messages = engine.tick(pending.drain(..));
                publish(&mut sink, messages).await?;
                if engine.is_shut_down() {
                    break;
                }
            }
        }
    }

    info!("Engine stopped");
    Ok(())
}
