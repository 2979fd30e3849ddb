//! Rotor station source
//!
//! A station serves tracks in batches. The controller walks a batch one
//! track at a time and fetches a new one when it is exhausted or when a
//! settings change made it stale. Besides the generic play-audio reports,
//! stations get rotor feedback (`radioStarted`, `trackStarted`, `skip`,
//! `trackFinished`).

use crate::config_ext::SourceConfigExt;
use crate::controller::{Mode, SourceController, SourceSettings};
use crate::common::{ControllerCore, CurrentTrack, TELEMETRY_DRAIN_TIMEOUT};
use crate::error::{ControllerError, Result};
use crate::telemetry::Report;
use crate::track::Track;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use yacatalog::{
    CatalogClient, Restrictions, RotorFeedback, RotorSettings, SourceEntry, StationId,
    StationResult, StationTracks,
};
use yaconfig::Config;

pub const DEFAULT_STATION: &str = "onyourwave";

pub struct StationController {
    core: ControllerCore,
    /// Tag of the wanted (or current) station
    station_tag: String,
    stations: IndexMap<StationId, StationResult>,
    source: Option<StationId>,
    batch: Option<StationTracks>,
    batch_index: usize,
    batch_stale: bool,
}

impl StationController {
    pub fn new(client: Arc<dyn CatalogClient>, config: Arc<Config>) -> Self {
        let station_tag = config
            .get_source_id(Mode::Radio)
            .unwrap_or_else(|| DEFAULT_STATION.to_string());
        Self {
            core: ControllerCore::new(client, config),
            station_tag,
            stations: IndexMap::new(),
            source: None,
            batch: None,
            batch_index: 0,
            batch_stale: false,
        }
    }

    fn find_station(&self, tag: &str) -> Option<&StationResult> {
        self.stations.values().find(|s| s.station.id.tag == tag)
    }

    fn current_station(&self) -> Option<&StationResult> {
        self.source.as_ref().and_then(|id| self.stations.get(id))
    }

    /// `type:tag` of the tuned station
    fn station_full_id(&self) -> Result<String> {
        self.source
            .as_ref()
            .map(StationId::full)
            .ok_or_else(|| ControllerError::UnknownSource(self.station_tag.clone()))
    }

    fn batch_id(&self) -> Option<String> {
        self.batch.as_ref().map(|b| b.batch_id.clone())
    }

    /// Index of the current track within the batch
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    /// Settings in effect for a station: config override first, then the
    /// station default sent by the server
    fn effective_settings(&self, tag: &str) -> Option<RotorSettings> {
        self.core
            .config
            .get_station_settings(tag)
            .or_else(|| self.find_station(tag).and_then(|s| s.settings2.clone()))
    }

    async fn start_new_batch(&mut self) -> Result<()> {
        let station = self.station_full_id()?;
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let batch = self
            .core
            .call("rotor_station_tracks", || {
                client.rotor_station_tracks(&station, None, timeout)
            })
            .await?;
        if batch.sequence.is_empty() {
            return Err(ControllerError::EmptyBatch(station));
        }
        debug!(station = %station, batch_id = %batch.batch_id, tracks = batch.sequence.len(), "New batch");

        let from = self
            .current_station()
            .and_then(|s| s.station.id_for_from.clone())
            .unwrap_or_else(|| station.clone());
        self.core.telemetry.dispatch(vec![Report::rotor(
            &station,
            Some(&batch.batch_id),
            RotorFeedback::RadioStarted { from },
        )]);

        self.batch = Some(batch);
        self.batch_index = 0;
        self.batch_stale = false;
        Ok(())
    }

    fn ended_reports(&self, previous: &CurrentTrack, played: f64) -> Vec<Report> {
        let mut reports = vec![Report::play_ended(&previous.track, &previous.play_id, played)];
        if let Ok(station) = self.station_full_id() {
            let track_id = previous.track.id.clone();
            let feedback = if played > 0.0 {
                RotorFeedback::Skip {
                    track_id,
                    total_played_seconds: played,
                }
            } else {
                RotorFeedback::TrackFinished {
                    track_id,
                    total_played_seconds: previous.track.duration_secs(),
                }
            };
            reports.push(Report::rotor(&station, self.batch_id().as_deref(), feedback));
        }
        reports
    }

    fn report_ended(&self, previous: &CurrentTrack, played: f64) {
        self.core
            .telemetry
            .dispatch(self.ended_reports(previous, played));
    }

    fn report_started(&self) {
        let Some(current) = &self.core.current else {
            return;
        };
        let mut reports = vec![Report::play_started(&current.track, &current.play_id)];
        if let Ok(station) = self.station_full_id() {
            reports.push(Report::rotor(
                &station,
                self.batch_id().as_deref(),
                RotorFeedback::TrackStarted {
                    track_id: current.track.id.clone(),
                },
            ));
        }
        self.core.telemetry.dispatch(reports);
    }

    async fn setup_current_track(&mut self) -> Result<Track> {
        let item = self
            .batch
            .as_ref()
            .and_then(|b| b.sequence.get(self.batch_index))
            .cloned()
            .ok_or(ControllerError::NoTracks)?;
        self.core.setup_current(item.track, item.liked).await
    }
}

#[async_trait]
impl SourceController for StationController {
    fn mode(&self) -> Mode {
        Mode::Radio
    }

    async fn initialize(&mut self) -> Result<()> {
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let dashboard = self
            .core
            .call("rotor_stations_dashboard", || {
                client.rotor_stations_dashboard(timeout)
            })
            .await?;
        let all = self
            .core
            .call("rotor_stations_list", || client.rotor_stations_list(timeout))
            .await?;

        self.stations.clear();
        for result in dashboard.into_iter().chain(all) {
            self.stations
                .entry(result.station.id.clone())
                .or_insert(result);
        }
        info!(count = self.stations.len(), "Rotor stations loaded");
        Ok(())
    }

    async fn set_source(
        &mut self,
        source_id: Option<&str>,
        settings: Option<SourceSettings>,
        played: f64,
    ) -> Result<Track> {
        if let Some(previous) = self.core.take_current() {
            self.report_ended(&previous, played);
        }

        let tag = source_id.unwrap_or(self.station_tag.as_str()).to_string();
        let station_id = self
            .find_station(&tag)
            .map(|s| s.station.id.clone())
            .ok_or_else(|| ControllerError::UnknownSource(tag.clone()))?;
        self.source = Some(station_id);
        self.station_tag = tag.clone();
        self.batch = None;

        let settings = match settings {
            Some(SourceSettings::Station(s)) => Some(s),
            _ => self.effective_settings(&tag),
        };
        if let Some(settings) = settings {
            match self
                .apply_source_settings(&SourceSettings::Station(settings), true)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(station = %tag, "Station rejected its settings"),
                Err(err) => warn!(station = %tag, "Failed to apply settings: {}", err),
            }
        }
        debug!(station = %tag, "Tuned to station");

        self.start_new_batch().await?;
        let track = self.setup_current_track().await?;
        self.report_started();
        Ok(track)
    }

    async fn apply_source_settings(
        &mut self,
        settings: &SourceSettings,
        force: bool,
    ) -> Result<bool> {
        let SourceSettings::Station(settings) = settings else {
            return Ok(true);
        };
        let tag = self.station_tag.clone();
        if !force && self.effective_settings(&tag).as_ref() == Some(settings) {
            debug!(station = %tag, "Settings unchanged");
            return Ok(true);
        }

        let station = self.station_full_id()?;
        debug!(
            station = %station,
            language = %settings.language,
            diversity = %settings.diversity,
            mood_energy = %settings.mood_energy,
            "Apply settings"
        );
        let timeout = self.core.policy.timeout;
        let client = self.core.client.clone();
        let accepted = self
            .core
            .call("rotor_station_settings", || {
                client.rotor_station_settings(&station, settings, timeout)
            })
            .await?;
        if !accepted {
            return Ok(false);
        }

        self.core.config.set_station_settings(&tag, settings)?;
        if self.batch.is_some() {
            self.batch_stale = true;
        }
        Ok(true)
    }

    async fn get_next_track(&mut self, played: f64) -> Result<Track> {
        if let Some(previous) = self.core.take_current() {
            self.report_ended(&previous, played);
        }

        let next = self.batch_index + 1;
        let exhausted = self
            .batch
            .as_ref()
            .is_none_or(|b| next >= b.sequence.len());
        if self.batch_stale || exhausted {
            self.start_new_batch().await?;
        } else {
            self.batch_index = next;
        }

        let track = self.setup_current_track().await?;
        self.report_started();
        Ok(track)
    }

    async fn like_track(&mut self) -> Result<bool> {
        self.core.like_current().await
    }

    fn get_sources_list(&self) -> Vec<SourceEntry> {
        self.stations
            .values()
            .map(|s| SourceEntry::new(s.station.id.tag.clone(), s.station.name.trim()))
            .collect()
    }

    fn get_source_restrictions(&self, source_id: Option<&str>) -> Option<Restrictions> {
        let station = match source_id {
            Some(tag) => self.find_station(tag),
            None => self.current_station(),
        };
        station.and_then(|s| s.station.restrictions2.clone())
    }

    fn get_source_settings(&self, source_id: Option<&str>) -> Option<SourceSettings> {
        let tag = match source_id {
            Some(tag) => tag.to_string(),
            None => self.current_station()?.station.id.tag.clone(),
        };
        self.effective_settings(&tag).map(SourceSettings::Station)
    }

    fn source_id(&self) -> Option<String> {
        self.current_station().map(|s| s.station.id.tag.clone())
    }

    fn source_name(&self) -> Option<String> {
        self.current_station()
            .map(|s| s.station.name.trim().to_string())
    }

    fn high_res(&self) -> bool {
        self.core.high_res
    }

    fn set_high_res(&mut self, high_res: bool) {
        self.core.high_res = high_res;
    }

    async fn shutdown(&mut self, played: f64) {
        if let Some(previous) = self.core.take_current() {
            let reports = self.ended_reports(&previous, played);
            self.core.telemetry.send_now(reports).await;
        }
        self.core.telemetry.drain(TELEMETRY_DRAIN_TIMEOUT).await;
        debug!("Station controller shut down");
    }
}
