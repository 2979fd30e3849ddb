//! Media pipeline driven by the engine
//!
//! [`ClockPipeline`] plays nothing: it only runs a clock over the media
//! duration and raises the same events a decoding pipeline would.

use crate::dashboard::PlaybackState;
use crate::error::PipelineError;
use tokio::time::Instant;

/// Fraction of the duration at which `AboutToFinish` is raised
pub const ABOUT_TO_FINISH_RATIO: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    AboutToFinish,
    Eos,
    Error(String),
    StateChanged(PlaybackState),
}

pub trait MediaPipeline: Send {
    /// Loads a new media; the pipeline goes back to `Ready`
    fn set_uri(&mut self, uri: &str, duration_hint: Option<f64>) -> Result<(), PipelineError>;

    fn set_state(&mut self, state: PlaybackState) -> Result<(), PipelineError>;

    fn state(&self) -> PlaybackState;

    fn position(&self) -> f64;

    /// `None` while unknown
    fn duration(&self) -> Option<f64>;

    fn seek(&mut self, position: f64) -> Result<(), PipelineError>;

    fn set_volume(&mut self, volume: f64);

    fn volume(&self) -> f64;

    /// Events raised since the last poll
    fn poll_events(&mut self) -> Vec<PipelineEvent>;
}

/// Clock-only pipeline
#[derive(Debug)]
pub struct ClockPipeline {
    uri: Option<String>,
    state: PlaybackState,
    /// Position accumulated before `started_at`
    offset: f64,
    started_at: Option<Instant>,
    duration: Option<f64>,
    volume: f64,
    about_to_finish_sent: bool,
    eos_sent: bool,
    events: Vec<PipelineEvent>,
}

impl Default for ClockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPipeline {
    pub fn new() -> Self {
        Self {
            uri: None,
            state: PlaybackState::Ready,
            offset: 0.0,
            started_at: None,
            duration: None,
            volume: 1.0,
            about_to_finish_sent: false,
            eos_sent: false,
            events: Vec::new(),
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    fn elapsed(&self) -> f64 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn change_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.events.push(PipelineEvent::StateChanged(state));
        }
    }

    fn reset_markers(&mut self) {
        let position = self.position();
        if let Some(duration) = self.duration {
            self.about_to_finish_sent = position >= duration * ABOUT_TO_FINISH_RATIO;
            self.eos_sent = position >= duration;
        } else {
            self.about_to_finish_sent = false;
            self.eos_sent = false;
        }
    }
}

fn check_uri(uri: &str) -> Result<(), PipelineError> {
    let valid = uri.starts_with('/')
        || uri
            .split_once("://")
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty());
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidUri(uri.to_string()))
    }
}

impl MediaPipeline for ClockPipeline {
    fn set_uri(&mut self, uri: &str, duration_hint: Option<f64>) -> Result<(), PipelineError> {
        check_uri(uri)?;
        self.uri = Some(uri.to_string());
        self.duration = duration_hint.filter(|d| *d > 0.0);
        self.offset = 0.0;
        self.started_at = None;
        self.about_to_finish_sent = false;
        self.eos_sent = false;
        self.change_state(PlaybackState::Ready);
        Ok(())
    }

    fn set_state(&mut self, state: PlaybackState) -> Result<(), PipelineError> {
        match state {
            PlaybackState::Playing => {
                if self.uri.is_none() {
                    return Err(PipelineError::NoMedia);
                }
                if self.started_at.is_none() {
                    self.started_at = Some(Instant::now());
                }
            }
            PlaybackState::Paused => {
                self.offset = self.position();
                self.started_at = None;
            }
            PlaybackState::Ready => {
                self.offset = 0.0;
                self.started_at = None;
                self.about_to_finish_sent = false;
                self.eos_sent = false;
            }
            PlaybackState::Err => {
                return Err(PipelineError::Failed("cannot enter error state".into()));
            }
        }
        self.change_state(state);
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn position(&self) -> f64 {
        let position = self.offset + self.elapsed();
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn seek(&mut self, position: f64) -> Result<(), PipelineError> {
        if self.uri.is_none() {
            return Err(PipelineError::NoMedia);
        }
        self.offset = position.max(0.0);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.reset_markers();
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn poll_events(&mut self) -> Vec<PipelineEvent> {
        if self.state == PlaybackState::Playing {
            if let Some(duration) = self.duration {
                let position = self.position();
                if !self.about_to_finish_sent && position >= duration * ABOUT_TO_FINISH_RATIO {
                    self.about_to_finish_sent = true;
                    self.events.push(PipelineEvent::AboutToFinish);
                }
                if !self.eos_sent && position >= duration {
                    self.eos_sent = true;
                    self.events.push(PipelineEvent::Eos);
                }
            }
        }
        std::mem::take(&mut self.events)
    }
}
