//! Two-channel crossfade engine.
//!
//! The engine owns exactly two playback channels and alternates between them.
//! A mood change picks a random playable track for the mood, loads it on the
//! idle channel at volume 0 and ramps both channels linearly until the new one
//! is at full volume. The first track after startup goes straight to channel
//! A at full volume with no ramp.
//!
//! If loading or a volume update fails mid-transition the engine stops both
//! channels and tries once to start the new track directly on channel A.
//! Errors never escape [`CrossfadeEngine::set_mood`]; they are logged and
//! reported through [`EngineEvent`]s.

use super::{
    BackendError, ChannelId, Clock, CrossfadeConfig, CrossfadeRamp, PlaybackBackend, SystemClock,
    TrackCatalog,
};
use crate::mood::{Mood, MoodError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    InvalidMood(#[from] MoodError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Playing,
    Crossfading,
    ErrorRecovery,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioChannel {
    pub id: ChannelId,
    pub volume: f32,
    pub playing_track: Option<PathBuf>,
}

impl AudioChannel {
    fn idle(id: ChannelId) -> Self {
        Self {
            id,
            volume: 0.0,
            playing_track: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub current_mood: Option<Mood>,
    pub current_track: Option<PathBuf>,
    pub active_channel: ChannelId,
}

/// Shared flag that aborts a running crossfade and refuses new ones.
///
/// Clones observe the same flag, so another thread can stop a ramp that is
/// blocking the engine's owner.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub seq: u64,
    pub elapsed: Duration, // since the engine was created
    pub mood: Option<Mood>,
    pub kind: EngineEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    StateChanged { from: EngineState, to: EngineState },
    TrackSelected { track: PathBuf },
    NoCandidates,
    CrossfadeStarted { from: ChannelId, to: ChannelId },
    CrossfadeCompleted { channel: ChannelId },
    CrossfadeCancelled,
    RecoveryStarted { reason: String },
    RecoverySucceeded,
    RecoveryFailed { reason: String },
    Shutdown,
}

enum Transition {
    Completed(ChannelId),
    Cancelled,
}

pub struct CrossfadeEngine<B, C = SystemClock> {
    backend: B,
    clock: C,
    catalog: TrackCatalog,
    config: CrossfadeConfig,
    playback: PlaybackState,
    channels: [AudioChannel; 2],
    state: EngineState,
    rng: StdRng,
    signal: ShutdownSignal,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
    started: Instant,
    seq: u64,
}

impl<B: PlaybackBackend> CrossfadeEngine<B, SystemClock> {
    pub fn new(backend: B, catalog: TrackCatalog, config: CrossfadeConfig) -> Self {
        Self::with_clock(backend, SystemClock, catalog, config)
    }
}

impl<B: PlaybackBackend, C: Clock> CrossfadeEngine<B, C> {
    pub fn with_clock(backend: B, clock: C, catalog: TrackCatalog, config: CrossfadeConfig) -> Self {
        Self {
            backend,
            clock,
            catalog,
            config,
            playback: PlaybackState::default(),
            channels: [AudioChannel::idle(ChannelId::A), AudioChannel::idle(ChannelId::B)],
            state: EngineState::Idle,
            rng: StdRng::from_entropy(),
            signal: ShutdownSignal::default(),
            events: None,
            started: Instant::now(),
            seq: 0,
        }
    }

    /// Deterministic track selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn subscribe(&mut self, sender: mpsc::UnboundedSender<EngineEvent>) {
        self.events = Some(sender);
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Switch the music to `mood`. Returns whether a change was made.
    ///
    /// Blocks for the length of the crossfade.
    pub fn set_mood(&mut self, mood: Mood) -> bool {
        if self.state == EngineState::Shutdown || self.signal.is_raised() {
            warn!(%mood, "engine is shut down, ignoring mood");
            return false;
        }
        if !self.catalog.contains_mood(mood) {
            warn!(%mood, "mood has no catalog entry");
            return false;
        }
        if self.playback.current_mood == Some(mood) {
            debug!(%mood, "mood already playing, continuing current track");
            return false;
        }

        let selected = self
            .catalog
            .candidates(mood, &self.backend)
            .choose(&mut self.rng)
            .map(|track| track.to_path_buf());

        let track = match selected {
            Some(track) => track,
            None => {
                warn!(%mood, "no playable tracks for mood");
                self.emit(Some(mood), EngineEventKind::NoCandidates);
                return false;
            }
        };

        info!(
            from = ?self.playback.current_mood,
            to = %mood,
            track = %track.display(),
            "mood change"
        );
        self.emit(Some(mood), EngineEventKind::TrackSelected { track: track.clone() });

        let outcome = if self.playback.current_track.is_none() {
            self.cold_start(mood, &track)
        } else {
            self.crossfade(mood, &track)
        };

        let channel = match outcome {
            Ok(Transition::Completed(channel)) => channel,
            Ok(Transition::Cancelled) => return false,
            Err(e) => match self.recover(mood, &track, e) {
                Some(channel) => channel,
                None => return false,
            },
        };

        self.playback = PlaybackState {
            current_mood: Some(mood),
            current_track: Some(track),
            active_channel: channel,
        };
        self.set_state(EngineState::Playing, Some(mood));
        true
    }

    /// Like [`set_mood`](Self::set_mood) for a raw, case-insensitive label.
    pub fn set_mood_label(&mut self, label: &str) -> Result<bool, EngineError> {
        let mood = label.parse::<Mood>()?;
        Ok(self.set_mood(mood))
    }

    pub fn current_mood(&self) -> Option<Mood> {
        self.playback.current_mood
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn channel(&self, id: ChannelId) -> &AudioChannel {
        &self.channels[id.index()]
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Silence both channels and release the backend. Safe to call twice.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Shutdown {
            return Ok(());
        }

        self.signal.raise();
        self.stop_all();
        let mood = self.playback.current_mood;
        self.playback = PlaybackState::default();

        // stay out of Shutdown until the backend is released so a retry can finish it
        self.backend.shutdown()?;

        self.set_state(EngineState::Shutdown, mood);
        self.emit(mood, EngineEventKind::Shutdown);
        info!("audio engine shut down");
        Ok(())
    }

    fn cold_start(&mut self, mood: Mood, track: &Path) -> Result<Transition, BackendError> {
        debug!(%mood, track = %track.display(), "nothing playing, starting directly");
        self.start_on(ChannelId::A, track, 1.0)?;
        self.emit(Some(mood), EngineEventKind::CrossfadeCompleted { channel: ChannelId::A });
        Ok(Transition::Completed(ChannelId::A))
    }

    fn crossfade(&mut self, mood: Mood, track: &Path) -> Result<Transition, BackendError> {
        let old = self.playback.active_channel;
        let new = old.other();

        self.set_state(EngineState::Crossfading, Some(mood));
        self.emit(Some(mood), EngineEventKind::CrossfadeStarted { from: old, to: new });
        debug!(%mood, from = %old, to = %new, "crossfading");

        self.start_on(new, track, 0.0)?;

        let interval = self.config.step_interval();
        for (old_volume, new_volume) in CrossfadeRamp::new(self.config.effective_steps()) {
            if self.signal.is_raised() {
                self.cancel(mood);
                return Ok(Transition::Cancelled);
            }
            self.apply_volume(old, old_volume)?;
            self.apply_volume(new, new_volume)?;
            self.clock.sleep(interval);
        }

        // exact endpoints regardless of float drift in the ramp
        self.apply_volume(old, 0.0)?;
        self.apply_volume(new, 1.0)?;
        self.backend.stop(old);
        self.channels[old.index()] = AudioChannel::idle(old);

        self.emit(Some(mood), EngineEventKind::CrossfadeCompleted { channel: new });
        Ok(Transition::Completed(new))
    }

    fn recover(&mut self, mood: Mood, track: &Path, cause: BackendError) -> Option<ChannelId> {
        warn!(%mood, track = %track.display(), error = %cause, "transition failed, recovering");
        self.set_state(EngineState::ErrorRecovery, Some(mood));
        self.emit(Some(mood), EngineEventKind::RecoveryStarted { reason: cause.to_string() });

        self.stop_all();

        match self.start_on(ChannelId::A, track, 1.0) {
            Ok(()) => {
                info!(%mood, track = %track.display(), "recovery successful");
                self.emit(Some(mood), EngineEventKind::RecoverySucceeded);
                Some(ChannelId::A)
            }
            Err(e) => {
                error!(
                    %mood,
                    track = %track.display(),
                    resolvable = self.backend.is_resolvable(track),
                    error = %e,
                    "failed to recover from crossfade error"
                );
                self.emit(Some(mood), EngineEventKind::RecoveryFailed { reason: e.to_string() });
                // forget the mood so the caller can retry it later
                self.playback = PlaybackState::default();
                self.set_state(EngineState::Idle, Some(mood));
                None
            }
        }
    }

    fn cancel(&mut self, mood: Mood) {
        info!(%mood, "crossfade cancelled");
        self.stop_all();
        self.playback = PlaybackState::default();
        self.set_state(EngineState::Idle, Some(mood));
        self.emit(Some(mood), EngineEventKind::CrossfadeCancelled);
    }

    fn start_on(&mut self, channel: ChannelId, track: &Path, volume: f32) -> Result<(), BackendError> {
        self.backend.load_looped(channel, track, volume)?;
        self.channels[channel.index()] = AudioChannel {
            id: channel,
            volume,
            playing_track: Some(track.to_path_buf()),
        };
        Ok(())
    }

    fn apply_volume(&mut self, channel: ChannelId, volume: f32) -> Result<(), BackendError> {
        self.backend.set_volume(channel, volume)?;
        self.channels[channel.index()].volume = volume;
        Ok(())
    }

    fn stop_all(&mut self) {
        for channel in ChannelId::BOTH {
            self.backend.stop(channel);
            self.channels[channel.index()] = AudioChannel::idle(channel);
        }
    }

    fn set_state(&mut self, to: EngineState, mood: Option<Mood>) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        debug!(?from, ?to, "engine state");
        self.emit(mood, EngineEventKind::StateChanged { from, to });
    }

    fn emit(&mut self, mood: Option<Mood>, kind: EngineEventKind) {
        self.seq += 1;
        if let Some(sender) = &self.events {
            let event = EngineEvent {
                seq: self.seq,
                elapsed: self.started.elapsed(),
                mood,
                kind,
            };
            if sender.send(event).is_err() {
                // receiver went away, stop building events nobody reads
                self.events = None;
            }
        }
    }
}
