// Configuration loaded from YAML

use crate::slots::{FileSlots, Slots, SqliteSlots, validate_key};
use crate::store::DEFAULT_KEY;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "tasklist";
const CONFIG_FILE: &str = "config.yaml";
const DB_FILE: &str = "tasklist.db";

/// Where the task list is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per key
    #[default]
    File,
    /// A table in a SQLite database
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            key: DEFAULT_KEY.to_string(),
        }
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults if the file is absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read config {:?}", path)),
        };

        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config {:?}", path))?;
        debug!(path = ?path, ?config, "Loaded config");
        Ok(config)
    }

    /// Load config from a path the user named explicitly; it must exist
    pub fn load_required<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(eyre!("Config file {:?} does not exist", path));
        }
        Self::load(path)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to null, not to a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_key(&self.key)?;
        if self.data_dir.as_os_str().is_empty() {
            return Err(eyre!("data_dir cannot be empty"));
        }
        Ok(())
    }

    /// Open the configured backend
    pub fn open_slots(&self) -> Result<Box<dyn Slots>> {
        let slots: Box<dyn Slots> = match self.backend {
            Backend::File => Box::new(FileSlots::open(&self.data_dir)?),
            Backend::Sqlite => Box::new(SqliteSlots::open(self.data_dir.join(DB_FILE))?),
        };
        debug!(backend = ?self.backend, data_dir = ?self.data_dir, "Opened slots");
        Ok(slots)
    }
}

/// `<config dir>/tasklist/config.yaml`, or `./config.yaml` when the platform
/// has no config dir
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// `<data dir>/tasklist`, or `./.tasklist` when the platform has no data dir
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".tasklist"))
}
