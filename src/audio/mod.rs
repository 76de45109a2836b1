pub mod backend;
pub mod catalog;
pub mod engine;
pub mod ramp;
#[cfg(feature = "audio")]
pub mod rodio_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendError, ChannelId, PlaybackBackend};
pub use catalog::{CatalogReport, TrackCatalog};
pub use engine::{
    CrossfadeEngine, EngineError, EngineEvent, EngineEventKind, EngineState, PlaybackState,
    ShutdownSignal,
};
pub use ramp::{Clock, CrossfadeRamp, SystemClock};
#[cfg(feature = "audio")]
pub use rodio_backend::RodioBackend;

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    pub duration_ms: u64, // whole ramp, milliseconds
    pub steps: u32,       // volume updates = steps + 1
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            steps: 30,
        }
    }
}

impl CrossfadeConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Zero steps would divide by zero in the ramp, so it is treated as one.
    pub fn effective_steps(&self) -> NonZeroU32 {
        NonZeroU32::new(self.steps).unwrap_or(NonZeroU32::MIN)
    }

    pub fn step_interval(&self) -> Duration {
        self.duration() / self.effective_steps().get()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}
