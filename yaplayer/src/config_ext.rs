//! Extension pour l'état du lecteur dans yaconfig

use anyhow::Result;
use serde_yaml::Value;
use yaconfig::Config;
use yasource::Mode;

pub const DEFAULT_VOLUME: f64 = 0.5;

/// Trait d'extension pour le mode et le volume du lecteur
pub trait PlayerConfigExt {
    /// Mode au démarrage (`radio` si absent ou invalide)
    fn get_mode(&self) -> Mode;

    fn set_mode(&self, mode: Mode) -> Result<()>;

    /// Volume entre 0.0 et 1.0
    fn get_volume(&self) -> f64;

    fn set_volume(&self, volume: f64) -> Result<()>;
}

impl PlayerConfigExt for Config {
    fn get_mode(&self) -> Mode {
        match self.get("mode") {
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => Mode::default(),
        }
    }

    fn set_mode(&self, mode: Mode) -> Result<()> {
        self.set("mode", mode.as_str())
    }

    fn get_volume(&self) -> f64 {
        self.get("volume")
            .and_then(|v| v.as_f64())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_VOLUME)
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        self.set("volume", volume.clamp(0.0, 1.0))
    }
}
