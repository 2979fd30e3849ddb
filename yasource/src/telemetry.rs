//! Best-effort playback reports
//!
//! Reports describing one transition are sent sequentially inside a single
//! detached task. Tasks are tracked so that a controller can wait for them
//! on shutdown. Failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use yacatalog::{
    CatalogClient, CatalogError, PlayAudio, RetryPolicy, RotorFeedback, Track as CatalogTrack,
    with_retry,
};

/// `from` value announced to the play-audio endpoint
pub const APP_NAME: &str = "desktop_win-home-playlist_of_the_day-playlist-default";

/// One telemetry call
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    PlayAudio(PlayAudio),
    Rotor {
        station: String,
        batch_id: Option<String>,
        feedback: RotorFeedback,
    },
}

impl Report {
    /// Generic report for a track that starts playing
    pub fn play_started(track: &CatalogTrack, play_id: &str) -> Self {
        let total = track.duration_secs();
        Report::PlayAudio(PlayAudio {
            track_id: track.id.clone(),
            album_id: track.album_id().map(str::to_string),
            play_id: play_id.to_string(),
            from: APP_NAME.to_string(),
            track_length_seconds: track.duration_ms / 1000,
            total_played_seconds: 0.0,
            end_position_seconds: total,
        })
    }

    /// Generic report for a track that stopped; `played == 0` means it
    /// played to the end
    pub fn play_ended(track: &CatalogTrack, play_id: &str, played: f64) -> Self {
        let total = track.duration_secs();
        Report::PlayAudio(PlayAudio {
            track_id: track.id.clone(),
            album_id: track.album_id().map(str::to_string),
            play_id: play_id.to_string(),
            from: APP_NAME.to_string(),
            track_length_seconds: track.duration_ms / 1000,
            total_played_seconds: if played > 0.0 { played } else { total },
            end_position_seconds: total,
        })
    }

    pub fn rotor(station: &str, batch_id: Option<&str>, feedback: RotorFeedback) -> Self {
        Report::Rotor {
            station: station.to_string(),
            batch_id: batch_id.map(str::to_string),
            feedback,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Report::PlayAudio(_) => "play_audio",
            Report::Rotor { feedback, .. } => feedback.name(),
        }
    }
}

/// Sends reports in the background
#[derive(Clone)]
pub struct Telemetry {
    client: Arc<dyn CatalogClient>,
    policy: RetryPolicy,
    tracker: TaskTracker,
}

impl Telemetry {
    pub fn new(client: Arc<dyn CatalogClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            tracker: TaskTracker::new(),
        }
    }

    /// Spawns one task sending `reports` in order
    pub fn dispatch(&self, reports: Vec<Report>) {
        if reports.is_empty() {
            return;
        }
        let client = self.client.clone();
        let policy = self.policy;
        self.tracker.spawn(async move {
            send_all(client.as_ref(), &policy, &reports).await;
        });
    }

    /// Sends `reports` in order and waits for them
    pub async fn send_now(&self, reports: Vec<Report>) {
        send_all(self.client.as_ref(), &self.policy, &reports).await;
    }

    /// Waits for outstanding reports, at most `timeout`
    ///
    /// The tracker is closed: reports dispatched afterwards are still sent
    /// but no longer awaited.
    pub async fn drain(&self, timeout: Duration) {
        self.tracker.close();
        let pending = self.tracker.len();
        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(pending, "Telemetry drain timed out");
        }
    }

    /// Number of report tasks still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }
}

async fn send_all(client: &dyn CatalogClient, policy: &RetryPolicy, reports: &[Report]) {
    for report in reports {
        let result = match report {
            Report::PlayAudio(play) => {
                with_retry(policy, "play_audio", CatalogError::is_retryable, || {
                    client.play_audio(play, policy.timeout)
                })
                .await
            }
            Report::Rotor {
                station,
                batch_id,
                feedback,
            } => with_retry(policy, feedback.name(), CatalogError::is_retryable, || {
                client.rotor_feedback(station, batch_id.as_deref(), feedback, policy.timeout)
            })
            .await
            .map(|_| ()),
        };

        match result {
            Ok(()) => debug!(report = report.name(), "Informed catalog"),
            Err(err) => debug!(report = report.name(), "Report dropped: {}", err),
        }
    }
}
