use crate::error::AnalysisError;
use crate::llm::{self, ProviderId};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::{fs, io};

/// Key the whole [`AppSettings`] object is stored under.
pub const SETTINGS_KEY: &str = "settings";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Accepts both the numeric form (1-5) written by older builds and the string form.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogLevelVisitor;

        impl<'de> Visitor<'de> for LogLevelVisitor {
            type Value = LogLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer representing log level")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogLevel, E> {
                match value.to_lowercase().as_str() {
                    "trace" => Ok(LogLevel::Trace),
                    "debug" => Ok(LogLevel::Debug),
                    "info" => Ok(LogLevel::Info),
                    "warn" => Ok(LogLevel::Warn),
                    "error" => Ok(LogLevel::Error),
                    _ => Err(E::unknown_variant(
                        value,
                        &["trace", "debug", "info", "warn", "error"],
                    )),
                }
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogLevel, E> {
                match value {
                    1 => Ok(LogLevel::Trace),
                    2 => Ok(LogLevel::Debug),
                    3 => Ok(LogLevel::Info),
                    4 => Ok(LogLevel::Warn),
                    5 => Ok(LogLevel::Error),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &"1-5")),
                }
            }
        }

        deserializer.deserialize_any(LogLevelVisitor)
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub api_provider: ProviderId,
    #[serde(default = "default_api_keys")]
    pub api_keys: HashMap<String, String>,
    #[serde(default = "default_selected_models")]
    pub selected_models: HashMap<String, String>,
    #[serde(default = "default_spell_enabled")]
    pub spell_enabled: bool,
    #[serde(default = "default_grammar_enabled")]
    pub grammar_enabled: bool,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_api_keys() -> HashMap<String, String> {
    HashMap::new()
}

fn default_selected_models() -> HashMap<String, String> {
    llm::get_available_providers()
        .into_iter()
        .map(|provider| (provider.id.to_string(), provider.default_model))
        .collect()
}

fn default_spell_enabled() -> bool {
    true
}

fn default_grammar_enabled() -> bool {
    true
}

// Larger pages take noticeably longer to come back from the model.
fn default_max_text_length() -> usize {
    8000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_provider: ProviderId::default(),
            api_keys: default_api_keys(),
            selected_models: default_selected_models(),
            spell_enabled: default_spell_enabled(),
            grammar_enabled: default_grammar_enabled(),
            max_text_length: default_max_text_length(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl AppSettings {
    /// Trimmed key for `provider`; a missing or blank key is a configuration error.
    pub fn api_key(&self, provider: ProviderId) -> Result<String, AnalysisError> {
        self.api_keys
            .get(&provider.to_string())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or(AnalysisError::MissingApiKey { provider })
    }

    pub fn model_for(&self, provider: ProviderId) -> String {
        self.selected_models
            .get(&provider.to_string())
            .filter(|model| !model.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string())
    }
}

fn ensure_provider_defaults(settings: &mut AppSettings) -> bool {
    let mut changed = false;
    for provider in llm::get_available_providers() {
        let id = provider.id.to_string();
        match settings.selected_models.get_mut(&id) {
            Some(existing) => {
                if existing.is_empty() {
                    *existing = provider.default_model.clone();
                    changed = true;
                }
            }
            None => {
                settings
                    .selected_models
                    .insert(id, provider.default_model.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Persistent key-value configuration storage.
pub trait SettingsStore: Send + Sync {
    /// Values stored under `keys`; absent keys are left out of the result.
    fn get(&self, keys: &[&str]) -> Map<String, Value>;

    /// Stores every entry of `values`, replacing existing ones.
    fn set(&self, values: Map<String, Value>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Map<String, Value> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        select(&data, keys)
    }

    fn set(&self, values: Map<String, Value>) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.extend(values);
        Ok(())
    }
}

/// Settings kept in a pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(
                    "Ignoring unreadable settings file {}: {}",
                    path.display(),
                    e
                );
                Map::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &Map<String, Value>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Map<String, Value> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        select(&data, keys)
    }

    fn set(&self, values: Map<String, Value>) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut merged = data.clone();
        merged.extend(values);
        // Memory only moves forward once the file has the new state.
        self.persist(&merged)?;
        *data = merged;
        Ok(())
    }
}

fn select(data: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

/// Reads settings, writing defaults back when nothing usable is stored.
pub fn get_settings<S: SettingsStore + ?Sized>(store: &S) -> AppSettings {
    let stored = store.get(&[SETTINGS_KEY]).remove(SETTINGS_KEY);

    let mut settings = match stored {
        Some(value) => match serde_json::from_value::<AppSettings>(value) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to parse settings: {}", e);
                let defaults = AppSettings::default();
                store_quietly(store, &defaults);
                defaults
            }
        },
        None => {
            debug!("No stored settings, writing defaults");
            let defaults = AppSettings::default();
            store_quietly(store, &defaults);
            defaults
        }
    };

    if ensure_provider_defaults(&mut settings) {
        store_quietly(store, &settings);
    }

    settings
}

pub fn write_settings<S: SettingsStore + ?Sized>(store: &S, settings: &AppSettings) -> Result<()> {
    let mut values = Map::new();
    values.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
    store.set(values)
}

fn store_quietly<S: SettingsStore + ?Sized>(store: &S, settings: &AppSettings) {
    if let Err(e) = write_settings(store, settings) {
        warn!("Failed to store settings: {:#}", e);
    }
}
