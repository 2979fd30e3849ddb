//! # YaMusic Configuration Module
//!
//! This crate provides the persisted key-value store used by the player and
//! the source controllers:
//! - Loading configuration from a YAML file
//! - Merging with an embedded default configuration
//! - Environment variable overrides
//! - Typed getters for the ambient settings (API, engine, logger)
//!
//! Unlike a process-wide singleton, a [`Config`] is constructed once at start
//! up and handed around as an `Arc<Config>`. Mutations stay in memory until
//! [`Config::save`] is called.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use yaconfig::Config;
//!
//! let config = Arc::new(Config::load_config(None)?);
//! let retries = config.get_api_retries();
//! config.set("volume", serde_yaml::Value::from(0.3))?;
//! config.save()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("yamusic.yaml");

const CONFIG_FILE_NAME: &str = "config.yaml";
const APP_DIR_NAME: &str = "yamusic";
const LOCAL_DIR_NAME: &str = ".yamusic";
const ENV_CONFIG_DIR: &str = "YAMUSIC_CONFIG";
const ENV_PREFIX: &str = "YAMUSIC_CONFIG__";

// Default values for configuration
const DEFAULT_API_BASE_URL: &str = "https://api.music.yandex.net";
const DEFAULT_API_RETRIES: u64 = 3;
const DEFAULT_API_RETRY_DELAY_MS: u64 = 300;
const DEFAULT_API_TIMEOUT_MS: u64 = 2000;
const DEFAULT_API_CODEC: &str = "mp3";
const DEFAULT_ENGINE_TICK_MS: u64 = 500;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "yamusic.log";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or($default),
                _ => $default,
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => s,
                _ => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration store for YaMusic
///
/// Values are addressed by key paths (`&["api", "timeout_ms"]`). Keys are
/// case-insensitive: they are lower-cased on load and on access.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
    /// Values injected from the environment, kept out of `config.yaml`
    env_overrides: Vec<EnvOverride>,
}

/// One `YAMUSIC_CONFIG__A__B=value` override
#[derive(Debug, Clone)]
struct EnvOverride {
    path: Vec<String>,
    value: Value,
    /// What the file layer held before the override, if anything
    previous: Option<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: Option<&Path>) -> PathBuf {
        // 1. Try provided directory
        if let Some(dir) = directory {
            return dir.to_path_buf();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(LOCAL_DIR_NAME).exists() {
            return PathBuf::from(LOCAL_DIR_NAME);
        }

        // 4. XDG config directory
        if let Some(config_home) = dirs::config_dir() {
            return config_home.join(APP_DIR_NAME);
        }

        PathBuf::from(LOCAL_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Cannot create config directory {}", path.display()))?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        Ok(())
    }

    /// Loads the configuration
    ///
    /// This method:
    /// 1. Determines the configuration directory (see [`Config::find_config_dir`] order)
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with `config.yaml` from that directory if present
    /// 4. Applies `YAMUSIC_CONFIG__A__B=value` environment overrides
    ///
    /// Nothing is written to disk until [`Config::save`] is called.
    pub fn load_config(directory: Option<&Path>) -> Result<Self> {
        Self::load_with_env(directory, env::vars())
    }

    fn load_with_env(
        directory: Option<&Path>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) if !data.is_empty() => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                merge_yaml(&mut config_value, &external_value);
            }
            _ => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut config_value = lower_keys_value(config_value);
        let env_overrides = apply_env_overrides(&mut config_value, vars);

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
            env_overrides,
        })
    }

    /// Directory holding `config.yaml` and relative managed files
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the persisted `config.yaml`
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flushes the in-memory configuration to `config.yaml`
    ///
    /// Environment overrides are not written back unless the value was
    /// changed in memory since loading.
    pub fn save(&self) -> Result<()> {
        let mut snapshot = self.data().clone();
        for over in &self.env_overrides {
            let path: Vec<&str> = over.path.iter().map(String::as_str).collect();
            if get_value_internal(&snapshot, &path).ok().as_ref() != Some(&over.value) {
                continue;
            }
            match &over.previous {
                Some(previous) => set_value_internal(&mut snapshot, &path, previous.clone())?,
                None => remove_value_internal(&mut snapshot, &path),
            }
        }
        let yaml = serde_yaml::to_string(&snapshot)?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("Failed to save config to {}", self.path.display()))?;
        debug!(config_file = %self.path.display(), "Config saved");
        Ok(())
    }

    /// Sets a configuration value at the specified path (in memory only)
    ///
    /// Intermediate mappings are created when missing.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data();
        set_value_internal(&mut data, path, value)
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data();
        get_value_internal(&data, path)
    }

    /// Top-level key lookup, `None` when absent or null
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.get_value(&[key]) {
            Ok(Value::Null) | Err(_) => None,
            Ok(value) => Some(value),
        }
    }

    /// Top-level key assignment (in memory only)
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set_value(&[key], value.into())
    }

    /// Resolves a file path configured relative to the config directory
    pub fn get_managed_file(&self, path: &[&str], default: &str) -> PathBuf {
        let file = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        };
        let file = PathBuf::from(file);
        if file.is_absolute() {
            file
        } else {
            self.config_dir.join(file)
        }
    }

    /// OAuth token used by the catalog client
    pub fn get_token(&self) -> Option<String> {
        match self.get_value(&["token"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    impl_string_config!(
        get_api_base_url,
        set_api_base_url,
        &["api", "base_url"],
        DEFAULT_API_BASE_URL
    );

    impl_string_config!(get_api_codec, set_api_codec, &["api", "codec"], DEFAULT_API_CODEC);

    impl_u64_config!(
        get_api_retries,
        set_api_retries,
        &["api", "retries"],
        DEFAULT_API_RETRIES
    );

    impl_u64_config!(
        get_api_retry_delay_ms,
        set_api_retry_delay_ms,
        &["api", "retry_delay_ms"],
        DEFAULT_API_RETRY_DELAY_MS
    );

    impl_u64_config!(
        get_api_timeout_ms,
        set_api_timeout_ms,
        &["api", "timeout_ms"],
        DEFAULT_API_TIMEOUT_MS
    );

    impl_u64_config!(
        get_engine_tick_ms,
        set_engine_tick_ms,
        &["engine", "tick_ms"],
        DEFAULT_ENGINE_TICK_MS
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    /// Per-call timeout of catalog requests
    pub fn get_api_timeout(&self) -> Duration {
        Duration::from_millis(self.get_api_timeout_ms())
    }

    /// Delay between two attempts of a failed catalog request
    pub fn get_api_retry_delay(&self) -> Duration {
        Duration::from_millis(self.get_api_retry_delay_ms())
    }

    /// Engine tick interval
    pub fn get_engine_tick(&self) -> Duration {
        Duration::from_millis(self.get_engine_tick_ms().max(10))
    }

    /// Log file path, relative paths are resolved against the config directory
    pub fn get_log_file(&self) -> PathBuf {
        self.get_managed_file(&["logger", "file"], DEFAULT_LOG_FILE)
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if data.is_null() {
        *data = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(
    config: &mut Value,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Vec<EnvOverride> {
    let mut applied = Vec::new();
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = stripped.split("__").collect::<Vec<_>>();
        let previous = get_value_internal(config, &key_path).ok();
        let yaml_value = convert_env_value(&value);
        match set_value_internal(config, &key_path, yaml_value.clone()) {
            Ok(()) => applied.push(EnvOverride {
                path: key_path.iter().map(|k| k.to_lowercase()).collect(),
                value: yaml_value,
                previous,
            }),
            Err(err) => warn!(env_var = %key, "Ignoring config override: {}", err),
        }
    }
    applied
}

/// Removes the key at `path`; missing keys are ignored
fn remove_value_internal(data: &mut Value, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = data;
    for key in parents {
        match current {
            Value::Mapping(map) => match map.get_mut(Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return,
            },
            _ => return,
        }
    }
    if let Value::Mapping(map) = current {
        map.remove(Value::String(last.to_lowercase()));
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let new_key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(new_key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // pour les scalaires ou séquences, on remplace
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(Some(dir.path())).unwrap();

        assert_eq!(config.get_api_retries(), 3);
        assert_eq!(config.get_api_retry_delay(), Duration::from_millis(300));
        assert_eq!(config.get_api_timeout(), Duration::from_secs(2));
        assert_eq!(config.get_api_codec(), "mp3");
        assert_eq!(config.get_token(), None);
        assert_eq!(config.get_log_file(), dir.path().join("yamusic.log"));
        // loading never writes
        assert!(!config.path().exists());
    }

    #[test]
    fn test_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "Token: abc\napi:\n  Retries: 5\n",
        )
        .unwrap();

        let config = Config::load_config(Some(dir.path())).unwrap();
        assert_eq!(config.get_token().as_deref(), Some("abc"));
        assert_eq!(config.get_api_retries(), 5);
        // untouched sibling keys keep their defaults
        assert_eq!(config.get_api_timeout_ms(), 2000);
    }

    #[test]
    fn test_set_is_in_memory_until_save() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(Some(dir.path())).unwrap();

        config
            .set_value(&["station_settings", "rock"], Value::from("x"))
            .unwrap();
        assert!(!config.path().exists());

        config.save().unwrap();
        let reloaded = Config::load_config(Some(dir.path())).unwrap();
        assert_eq!(
            reloaded.get_value(&["station_settings", "rock"]).unwrap(),
            Value::from("x")
        );
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "api:\n  retries: 5\n").unwrap();

        let config = Config::load_with_env(
            Some(dir.path()),
            env(&[
                ("YAMUSIC_CONFIG__TOKEN", "secret"),
                ("YAMUSIC_CONFIG__API__RETRIES", "9"),
                ("YAMUSIC_CONFIG__API__TIMEOUT_MS", "100"),
            ]),
        )
        .unwrap();
        assert_eq!(config.get_token().as_deref(), Some("secret"));
        assert_eq!(config.get_api_retries(), 9);
        config.set_api_timeout_ms(700).unwrap();
        config.save().unwrap();

        let written = fs::read_to_string(config.path()).unwrap();
        assert!(!written.contains("secret"), "{}", written);
        let reloaded = Config::load_with_env(Some(dir.path()), Vec::new()).unwrap();
        assert_eq!(reloaded.get_token(), None);
        // the file value comes back, the in-memory change is kept
        assert_eq!(reloaded.get_api_retries(), 5);
        assert_eq!(reloaded.get_api_timeout_ms(), 700);
        // the live config still sees the override
        assert_eq!(config.get_token().as_deref(), Some("secret"));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(Some(dir.path())).unwrap();
        assert!(config.get("does_not_exist").is_none());
        assert!(config.get_value(&["api", "nope"]).is_err());
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let external: Value = serde_yaml::from_str("b:\n  c: 20\n").unwrap();
        merge_yaml(&mut default, &external);
        assert_eq!(get_value_internal(&default, &["b", "c"]).unwrap(), Value::from(20));
        assert_eq!(get_value_internal(&default, &["b", "d"]).unwrap(), Value::from(3));
        assert_eq!(get_value_internal(&default, &["a"]).unwrap(), Value::from(1));
    }
}
