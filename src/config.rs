use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::phase::BoundaryPolicy;
use crate::session::MAX_CYCLE_MINUTES;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub work_minutes: u32,
    pub cycle_minutes: u32,
    pub work_track: PathBuf,
    pub rest_track: PathBuf,
    pub player: String,
    pub player_args: Vec<String>,
    pub sound: bool,
    pub loop_tracks: bool,
    pub boundary: BoundaryPolicy,
    pub tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let songs = songs_dir();
        Self {
            work_minutes: 20,
            cycle_minutes: 60,
            work_track: songs.join("work.wav"),
            rest_track: songs.join("rest.wav"),
            player: default_player().to_string(),
            player_args: Vec::new(),
            sound: true,
            loop_tracks: true,
            boundary: BoundaryPolicy::default(),
            tick_ms: 1000,
        }
    }
}

impl Config {
    /// Clamp durations to what a session will actually run with.
    pub fn normalized(mut self) -> Self {
        self.cycle_minutes = self.cycle_minutes.clamp(1, MAX_CYCLE_MINUTES);
        self.work_minutes = self.work_minutes.min(self.cycle_minutes);
        self
    }
}

fn songs_dir() -> PathBuf {
    ProjectDirs::from("", "", "rutinitas")
        .map(|pd| pd.config_dir().join("songs"))
        .unwrap_or_else(|| PathBuf::from("songs"))
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "paplay"
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "rutinitas") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("rutinitas_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like `load`, but reports why the file could not be used.
    pub fn try_load(&self) -> Result<Config, ConfigError> {
        let bytes = fs::read(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice::<Config>(&bytes).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match self.try_load() {
            Ok(cfg) => {
                tracing::info!(path = %self.path.display(), "loaded config");
                cfg
            }
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %self.path.display(), "no config file, using defaults");
                Config::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unusable config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, data).map_err(io_err)
    }
}
