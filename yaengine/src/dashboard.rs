//! Playback dashboard
//!
//! The engine owns the authoritative state through [`DashboardWriter`] and
//! publishes snapshots on stdout. The player keeps a read-only [`Dashboard`]
//! mirror that only the reader pump updates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Ready,
    Playing,
    Paused,
    Err,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Err => "err",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the engine exposes about playback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// `None` until the engine published its first state
    pub state: Option<PlaybackState>,
    pub position: f64,
    /// 0 until known
    pub duration: f64,
    pub volume: f64,
    pub uri: Option<String>,
    pub error: Option<String>,
    pub repeat: bool,
}

/// Engine-side writer, the only place the dashboard is mutated
#[derive(Debug, Default)]
pub struct DashboardWriter {
    snapshot: DashboardSnapshot,
}

impl DashboardWriter {
    pub fn new(volume: f64) -> Self {
        Self {
            snapshot: DashboardSnapshot {
                volume,
                ..Default::default()
            },
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    /// Records `state`; returns `true` when it changed
    pub fn set_state(&mut self, state: PlaybackState) -> bool {
        let changed = self.snapshot.state != Some(state);
        self.snapshot.state = Some(state);
        changed
    }

    pub fn set_position(&mut self, position: f64) {
        self.snapshot.position = position.max(0.0);
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.snapshot.duration = duration.max(0.0);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.snapshot.volume = volume;
    }

    pub fn set_uri(&mut self, uri: Option<String>) {
        self.snapshot.uri = uri;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.snapshot.error = Some(error.into());
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.snapshot.repeat = repeat;
    }
}

/// Player-side read-only mirror
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    inner: Arc<RwLock<DashboardSnapshot>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.read().clone()
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.read().state
    }

    pub fn position(&self) -> f64 {
        self.read().position
    }

    pub fn duration(&self) -> f64 {
        self.read().duration
    }

    pub fn volume(&self) -> f64 {
        self.read().volume
    }

    pub fn uri(&self) -> Option<String> {
        self.read().uri.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub fn repeat(&self) -> bool {
        self.read().repeat
    }

    pub(crate) fn apply(&self, snapshot: DashboardSnapshot) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub(crate) fn set_repeat(&self, repeat: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .repeat = repeat;
    }

    /// Marks the engine as gone; returns `true` if it was not already in
    /// error
    pub(crate) fn mark_exited(&self, message: &str) -> bool {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let was_err = snapshot.state == Some(PlaybackState::Err);
        snapshot.state = Some(PlaybackState::Err);
        if snapshot.error.is_none() {
            snapshot.error = Some(message.to_string());
        }
        !was_err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reports_state_changes() {
        let mut writer = DashboardWriter::new(0.5);
        assert!(writer.set_state(PlaybackState::Ready));
        assert!(!writer.set_state(PlaybackState::Ready));
        assert!(writer.set_state(PlaybackState::Playing));
        writer.set_position(-3.0);
        assert_eq!(writer.snapshot().position, 0.0);
        assert_eq!(writer.snapshot().volume, 0.5);
    }

    #[test]
    fn test_mark_exited_keeps_first_error() {
        let dashboard = Dashboard::new();
        dashboard.apply(DashboardSnapshot {
            state: Some(PlaybackState::Err),
            error: Some("Invalid media URI: bogus".into()),
            ..Default::default()
        });
        assert!(!dashboard.mark_exited("engine process exited"));
        assert_eq!(dashboard.error().as_deref(), Some("Invalid media URI: bogus"));

        let fresh = Dashboard::new();
        assert!(fresh.mark_exited("engine process exited"));
        assert_eq!(fresh.state(), Some(PlaybackState::Err));
        assert_eq!(fresh.error().as_deref(), Some("engine process exited"));
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&PlaybackState::Err).unwrap(), "\"err\"");
        let snapshot: DashboardSnapshot = serde_json::from_str(
            r#"{"state":"playing","position":1.5,"duration":10.0,"volume":0.5,"uri":null,"error":null,"repeat":false}"#,
        )
        .unwrap();
        assert_eq!(snapshot.state, Some(PlaybackState::Playing));
    }
}
