//! Extension pour persister l'état des sources dans yaconfig

use crate::controller::Mode;
use anyhow::Result;
use serde_yaml::{Mapping, Value};
use yacatalog::RotorSettings;
use yaconfig::Config;

const STATION_SETTINGS_KEY: &str = "station_settings";

/// Trait d'extension pour gérer l'état des sources dans `yaconfig::Config`
///
/// Les réglages d'une station sont stockés sous
/// `station_settings.<tag>.{language, diversity, mood_energy}`.
pub trait SourceConfigExt {
    /// Dernière source utilisée dans `mode`
    fn get_source_id(&self, mode: Mode) -> Option<String>;

    fn set_source_id(&self, mode: Mode, source_id: &str) -> Result<()>;

    /// Réglages sauvegardés pour une station
    fn get_station_settings(&self, tag: &str) -> Option<RotorSettings>;

    fn set_station_settings(&self, tag: &str, settings: &RotorSettings) -> Result<()>;

    fn get_high_res(&self) -> bool;

    fn set_high_res(&self, high_res: bool) -> Result<()>;
}

fn string_field(map: &Mapping, key: &str) -> String {
    match map.get(Value::String(key.to_string())) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl SourceConfigExt for Config {
    fn get_source_id(&self, mode: Mode) -> Option<String> {
        match self.get(mode.source_key()) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn set_source_id(&self, mode: Mode, source_id: &str) -> Result<()> {
        self.set(mode.source_key(), source_id)
    }

    fn get_station_settings(&self, tag: &str) -> Option<RotorSettings> {
        match self.get_value(&[STATION_SETTINGS_KEY, tag]) {
            Ok(Value::Mapping(map)) => Some(RotorSettings {
                language: string_field(&map, "language"),
                diversity: string_field(&map, "diversity"),
                mood_energy: string_field(&map, "mood_energy"),
            }),
            _ => None,
        }
    }

    fn set_station_settings(&self, tag: &str, settings: &RotorSettings) -> Result<()> {
        let mut map = Mapping::new();
        map.insert("language".into(), settings.language.clone().into());
        map.insert("diversity".into(), settings.diversity.clone().into());
        map.insert("mood_energy".into(), settings.mood_energy.clone().into());
        self.set_value(&[STATION_SETTINGS_KEY, tag], Value::Mapping(map))
    }

    fn get_high_res(&self) -> bool {
        match self.get("high_res") {
            Some(Value::Bool(b)) => b,
            _ => true,
        }
    }

    fn set_high_res(&self, high_res: bool) -> Result<()> {
        self.set("high_res", high_res)
    }
}
