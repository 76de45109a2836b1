// Configuration for MoodMuse
// Read-only: settings come from a TOML file when there is one, defaults otherwise

use crate::audio::{CrossfadeConfig, TrackCatalog};
use crate::mood::{smoother::DEFAULT_WINDOW, Mood};
use crate::worker::WorkerConfig;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub smoother: SmootherConfig,
    pub crossfade: CrossfadeConfig,
    pub worker: WorkerConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub window_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub music_dir: PathBuf,
    /// Explicit track lists; when present they replace directory scanning.
    pub tracks: Option<BTreeMap<Mood, Vec<PathBuf>>>,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("music_files"),
            tracks: None,
        }
    }
}

impl SmootherConfig {
    pub fn window(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.window_size)
            .ok_or_else(|| anyhow::anyhow!("smoother.window_size must be at least 1"))
    }
}

impl CatalogConfig {
    /// Explicit lists win; otherwise scan `music_dir`, falling back to the
    /// stock `songN.mp3` layout when the directory has nothing in it.
    pub fn build(&self) -> TrackCatalog {
        if let Some(tracks) = &self.tracks {
            return TrackCatalog::from_map(tracks.clone());
        }

        let scanned = TrackCatalog::scan_dir(&self.music_dir);
        if scanned.is_empty() {
            debug!("No tracks found by scanning, using default layout");
            TrackCatalog::default_layout(&self.music_dir)
        } else {
            scanned
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file means defaults; nothing is written back.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config = Self::from_toml(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.smoother.window()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("moodmuse").join("config.toml"))
    }
}
