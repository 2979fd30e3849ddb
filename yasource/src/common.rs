//! State and helpers shared by every controller
//!
//! `ControllerCore` owns the catalog handle, the retry policy, the
//! telemetry sender and the current-track state. The three controllers
//! embed one and delegate the remote plumbing to it.

use crate::config_ext::SourceConfigExt;
use crate::error::{ControllerError, Result};
use crate::telemetry::{Report, Telemetry};
use crate::track::Track;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use yacatalog::{
    CatalogClient, CatalogConfigExt, CatalogError, DownloadInfo, RetryPolicy,
    Track as CatalogTrack, with_retry,
};
use yaconfig::Config;

/// Upper bound for waiting on background reports at shutdown
pub const TELEMETRY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The track currently handed to the player
#[derive(Debug, Clone)]
pub struct CurrentTrack {
    pub track: CatalogTrack,
    pub play_id: String,
    pub info: Track,
}

pub struct ControllerCore {
    pub(crate) client: Arc<dyn CatalogClient>,
    pub(crate) config: Arc<Config>,
    pub(crate) policy: RetryPolicy,
    pub(crate) codec: String,
    pub(crate) high_res: bool,
    pub(crate) telemetry: Telemetry,
    pub(crate) current: Option<CurrentTrack>,
}

impl ControllerCore {
    pub fn new(client: Arc<dyn CatalogClient>, config: Arc<Config>) -> Self {
        let policy = config.get_retry_policy();
        Self {
            telemetry: Telemetry::new(client.clone(), policy),
            codec: config.get_api_codec(),
            high_res: config.get_high_res(),
            client,
            config,
            policy,
            current: None,
        }
    }

    /// Runs a catalog call through the retry wrapper
    pub(crate) async fn call<T, F, Fut>(&self, name: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = yacatalog::Result<T>>,
    {
        with_retry(&self.policy, name, CatalogError::is_retryable, op)
            .await
            .map_err(|err| ControllerError::remote(name, err))
    }

    /// Picks the download descriptor and resolves it to a stream URL
    pub(crate) async fn resolve_uri(&self, track: &CatalogTrack) -> Result<String> {
        let timeout = self.policy.timeout;
        let infos = self
            .call("download_info", || self.client.download_info(&track.id, timeout))
            .await?;
        let info = select_download_info(infos, &self.codec, self.high_res).ok_or_else(|| {
            ControllerError::NoDownloadInfo {
                track_id: track.id.clone(),
                codec: self.codec.clone(),
            }
        })?;
        debug!(
            track_id = %track.id,
            bitrate = info.bitrate_in_kbps,
            "Selected download info"
        );
        self.call("direct_link", || self.client.direct_link(&info, timeout))
            .await
    }

    /// Makes `track` current: resolves its URI and draws a new play id
    pub(crate) async fn setup_current(
        &mut self,
        track: CatalogTrack,
        liked: Option<bool>,
    ) -> Result<Track> {
        let uri = self.resolve_uri(&track).await?;
        let info = Track::short(&track).with_uri(uri).with_liked(liked);
        self.current = Some(CurrentTrack {
            track,
            play_id: generate_play_id(),
            info: info.clone(),
        });
        Ok(info)
    }

    /// Clears the current-track state
    pub(crate) fn take_current(&mut self) -> Option<CurrentTrack> {
        self.current.take()
    }

    pub(crate) async fn like_current(&self) -> Result<bool> {
        let current = self.current.as_ref().ok_or(ControllerError::NoTracks)?;
        let timeout = self.policy.timeout;
        let liked = self
            .call("like_track", || {
                self.client.like_track(&current.track.id, timeout)
            })
            .await?;
        debug!(track_id = %current.track.id, liked, "Like sent");
        Ok(liked)
    }

    /// Generic started report for the current track, in the background
    pub(crate) fn report_started(&self) {
        if let Some(current) = &self.current {
            self.telemetry
                .dispatch(vec![Report::play_started(&current.track, &current.play_id)]);
        }
    }

    /// Generic ended report for a track that stopped being current
    pub(crate) fn report_ended(&self, previous: &CurrentTrack, played: f64) {
        self.telemetry.dispatch(vec![Report::play_ended(
            &previous.track,
            &previous.play_id,
            played,
        )]);
    }

    /// Final generic report, awaited, then drain pending reports
    pub(crate) async fn shutdown(&mut self, played: f64) {
        if let Some(current) = self.take_current() {
            self.telemetry
                .send_now(vec![Report::play_ended(
                    &current.track,
                    &current.play_id,
                    played,
                )])
                .await;
        }
        self.telemetry.drain(TELEMETRY_DRAIN_TIMEOUT).await;
    }
}

/// Keeps the descriptors of `codec`, sorted by bitrate, and takes the
/// highest one for high-res playback, the lowest otherwise
pub fn select_download_info(
    infos: Vec<DownloadInfo>,
    codec: &str,
    high_res: bool,
) -> Option<DownloadInfo> {
    let mut candidates: Vec<DownloadInfo> = infos
        .into_iter()
        .filter(|info| info.codec.eq_ignore_ascii_case(codec))
        .collect();
    candidates.sort_by_key(|info| info.bitrate_in_kbps);
    if high_res {
        candidates.pop()
    } else {
        candidates.into_iter().next()
    }
}

/// Three integers in `[0, 1000)` joined by `-`
pub fn generate_play_id() -> String {
    let mut rng = rand::rng();
    format!(
        "{}-{}-{}",
        rng.random_range(0..1000),
        rng.random_range(0..1000),
        rng.random_range(0..1000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(codec: &str, bitrate: u32) -> DownloadInfo {
        DownloadInfo {
            codec: codec.into(),
            bitrate_in_kbps: bitrate,
            download_info_url: format!("https://dl/{}-{}", codec, bitrate),
            gain: false,
            preview: false,
        }
    }

    #[test]
    fn test_high_res_picks_max_bitrate() {
        let infos = vec![info("mp3", 192), info("aac", 256), info("mp3", 320), info("mp3", 128)];
        let chosen = select_download_info(infos, "mp3", true).unwrap();
        assert_eq!(chosen.bitrate_in_kbps, 320);
    }

    #[test]
    fn test_low_res_picks_min_bitrate() {
        let infos = vec![info("mp3", 192), info("aac", 64), info("mp3", 320), info("mp3", 128)];
        let chosen = select_download_info(infos, "mp3", false).unwrap();
        assert_eq!(chosen.bitrate_in_kbps, 128);
        assert_eq!(chosen.codec, "mp3");
    }

    #[test]
    fn test_no_candidate_for_codec() {
        let infos = vec![info("aac", 64), info("flac", 1411)];
        assert!(select_download_info(infos, "mp3", true).is_none());
        assert!(select_download_info(Vec::new(), "mp3", false).is_none());
    }

    #[test]
    fn test_play_id_format() {
        for _ in 0..50 {
            let id = generate_play_id();
            let parts: Vec<u32> = id.split('-').map(|p| p.parse().unwrap()).collect();
            assert_eq!(parts.len(), 3);
            assert!(parts.iter().all(|p| *p < 1000));
        }
    }
}
