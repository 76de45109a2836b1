// Test doubles: an in-memory backend with shared, inspectable state and a
// clock that records instead of sleeping

use super::{BackendError, ChannelId, Clock, PlaybackBackend, ShutdownSignal};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MockChannel {
    pub track: Option<PathBuf>,
    pub volume: f32,
    pub playing: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub resolvable: HashSet<PathBuf>,
    pub channels: [MockChannel; 2],
    pub loads: Vec<(ChannelId, PathBuf, f32)>,
    pub volumes: Vec<(ChannelId, f32)>,
    pub stops: Vec<ChannelId>,
    pub shutdowns: usize,
    pub shut_down: bool,
    // one-shot failures consumed by the next load on that channel
    pub failing_loads: VecDeque<ChannelId>,
    // tracks that never load
    pub broken_tracks: HashSet<PathBuf>,
    // fail the nth set_volume call from now (0 = next call)
    pub fail_volume_in: Option<usize>,
    // shutdown calls that fail before one succeeds
    pub failing_shutdowns: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn with_tracks<I, P>(tracks: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let backend = Self::default();
        backend.state().resolvable = tracks.into_iter().map(Into::into).collect();
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn channel(&self, channel: ChannelId) -> MockChannel {
        self.state().channels[channel.index()].clone()
    }

    pub fn fail_next_load_on(&self, channel: ChannelId) {
        self.state().failing_loads.push_back(channel);
    }

    pub fn break_track(&self, track: impl Into<PathBuf>) {
        self.state().broken_tracks.insert(track.into());
    }

    pub fn fail_volume_in(&self, calls: usize) {
        self.state().fail_volume_in = Some(calls);
    }

    /// Channels currently producing sound.
    pub fn audible(&self) -> Vec<ChannelId> {
        let state = self.state();
        ChannelId::BOTH
            .into_iter()
            .filter(|c| {
                let ch = &state.channels[c.index()];
                ch.playing && ch.volume > 0.0
            })
            .collect()
    }
}

impl PlaybackBackend for MockBackend {
    fn is_resolvable(&self, track: &Path) -> bool {
        self.state().resolvable.contains(track)
    }

    fn load_looped(&mut self, channel: ChannelId, track: &Path, volume: f32) -> Result<(), BackendError> {
        let mut state = self.state();

        let scripted = state.failing_loads.front() == Some(&channel);
        if scripted {
            state.failing_loads.pop_front();
        }
        if scripted || state.broken_tracks.contains(track) {
            return Err(BackendError::Load {
                track: track.to_path_buf(),
                reason: "mock load failure".to_string(),
            });
        }

        state.loads.push((channel, track.to_path_buf(), volume));
        state.channels[channel.index()] = MockChannel {
            track: Some(track.to_path_buf()),
            volume,
            playing: true,
        };
        Ok(())
    }

    fn set_volume(&mut self, channel: ChannelId, volume: f32) -> Result<(), BackendError> {
        let mut state = self.state();

        match state.fail_volume_in {
            Some(0) => {
                state.fail_volume_in = None;
                return Err(BackendError::Channel("mock volume failure".to_string()));
            }
            Some(n) => state.fail_volume_in = Some(n - 1),
            None => {}
        }

        state.volumes.push((channel, volume));
        state.channels[channel.index()].volume = volume;
        Ok(())
    }

    fn stop(&mut self, channel: ChannelId) {
        let mut state = self.state();
        state.stops.push(channel);
        state.channels[channel.index()] = MockChannel::default();
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        let mut state = self.state();
        if state.failing_shutdowns > 0 {
            state.failing_shutdowns -= 1;
            return Err(BackendError::Unavailable("mock release failure".to_string()));
        }
        state.shutdowns += 1;
        state.shut_down = true;
        state.channels = Default::default();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
    trip: Option<(usize, ShutdownSignal)>,
}

impl ManualClock {
    /// Raise `signal` once `after` sleeps have been recorded.
    pub fn tripping(after: usize, signal: ShutdownSignal) -> Self {
        Self {
            sleeps: Arc::default(),
            trip: Some((after, signal)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn sleep(&mut self, duration: Duration) {
        let mut sleeps = self.sleeps.lock().unwrap();
        sleeps.push(duration);
        if let Some((after, signal)) = &self.trip {
            if sleeps.len() >= *after {
                signal.raise();
            }
        }
    }
}
