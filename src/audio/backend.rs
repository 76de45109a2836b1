// Playback backend contract - anything that can loop a file on one of two
// channels with independent volume can drive the engine

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The output device or service could not be opened
    #[error("Audio backend unavailable: {0}")]
    Unavailable(String),

    /// A track could not be opened or decoded
    #[error("Failed to load '{}': {reason}", track.display())]
    Load { track: PathBuf, reason: String },

    /// Volume or stop command rejected by a channel
    #[error("Channel error: {0}")]
    Channel(String),
}

/// One of the two alternating playback slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelId {
    #[default]
    A,
    B,
}

impl ChannelId {
    pub const BOTH: [ChannelId; 2] = [ChannelId::A, ChannelId::B];

    pub fn other(self) -> Self {
        match self {
            ChannelId::A => ChannelId::B,
            ChannelId::B => ChannelId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            ChannelId::A => 0,
            ChannelId::B => 1,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

pub trait PlaybackBackend {
    /// Whether `track` exists and can be played right now.
    fn is_resolvable(&self, track: &Path) -> bool;

    /// Replace whatever is on `channel` with `track`, looped forever, starting
    /// at `volume`.
    fn load_looped(&mut self, channel: ChannelId, track: &Path, volume: f32) -> Result<(), BackendError>;

    fn set_volume(&mut self, channel: ChannelId, volume: f32) -> Result<(), BackendError>;

    /// Stop `channel` and release its track. Stopping an idle channel is a no-op.
    fn stop(&mut self, channel: ChannelId);

    /// Stop everything and release the output device.
    fn shutdown(&mut self) -> Result<(), BackendError>;
}
