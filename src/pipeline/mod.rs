// Frame loop glue - raw labels in, mood changes out
// The smoother debounces; the sink only hears about actual changes

use crate::audio::{Clock, CrossfadeEngine, PlaybackBackend};
use crate::mood::{Mood, MoodError, MoodSmoother};
use crate::worker::{MoodWorker, WorkerError};
use std::convert::Infallible;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PipelineError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    InvalidMood(#[from] MoodError),

    #[error("failed to apply mood: {0}")]
    Sink(#[source] E),
}

/// Where smoothed mood changes go.
pub trait MoodSink {
    type Error: std::error::Error + 'static;

    /// Returns whether `mood` took effect. A sink that declines gets the same
    /// mood again on the next frame.
    fn apply(&mut self, mood: Mood) -> Result<bool, Self::Error>;
}

// Synchronous shape: blocks the caller for the whole crossfade
impl<B: PlaybackBackend, C: Clock> MoodSink for CrossfadeEngine<B, C> {
    type Error = Infallible;

    fn apply(&mut self, mood: Mood) -> Result<bool, Self::Error> {
        Ok(self.set_mood(mood) || self.current_mood() == Some(mood))
    }
}

// Asynchronous shape: queue and return
impl MoodSink for MoodWorker {
    type Error = WorkerError;

    // queued is as good as applied; the worker cannot report back per mood
    fn apply(&mut self, mood: Mood) -> Result<bool, Self::Error> {
        self.set_mood(mood).map(|()| true)
    }
}

pub struct MoodPipeline<S> {
    smoother: MoodSmoother,
    sink: S,
    last_sent: Option<Mood>,
}

impl<S: MoodSink> MoodPipeline<S> {
    pub fn new(smoother: MoodSmoother, sink: S) -> Self {
        Self {
            smoother,
            sink,
            last_sent: None,
        }
    }

    /// Feed one classified label. Returns the new mood if the smoothed mood
    /// changed and the sink applied it. The very first label always forwards
    /// the starting mood. A mood the sink declined is offered again on the
    /// next label.
    pub fn push(&mut self, label: Mood) -> Result<Option<Mood>, PipelineError<S::Error>> {
        let dominant = self.smoother.update(label);
        if self.last_sent == Some(dominant) {
            return Ok(None);
        }

        debug!(%label, %dominant, "forwarding mood change");
        if !self.sink.apply(dominant).map_err(PipelineError::Sink)? {
            debug!(%dominant, "sink did not apply mood, retrying on next label");
            return Ok(None);
        }
        self.last_sent = Some(dominant);
        Ok(Some(dominant))
    }

    /// Like [`push`](Self::push) for a raw classifier string.
    pub fn push_label(&mut self, label: &str) -> Result<Option<Mood>, PipelineError<S::Error>> {
        let mood = label.parse::<Mood>()?;
        self.push(mood)
    }

    pub fn smoother(&self) -> &MoodSmoother {
        &self.smoother
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
