use super::{Mood, MoodError};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use tracing::debug;

pub const DEFAULT_WINDOW: usize = 10;

/// Majority vote over the last `N` raw labels.
///
/// The window starts full of `neutral`, so the counts always sum to `N`.
/// The dominant mood is sticky: ties never displace it, and evicting one of
/// its labels lowers the cached count without re-scanning the other moods.
/// That means the dominant mood can briefly trail another mood's count until
/// some new label strictly beats the cached value. Downstream music stability
/// depends on this hysteresis, so it is kept as-is.
#[derive(Debug, Clone)]
pub struct MoodSmoother {
    window: VecDeque<Mood>,
    counts: [usize; Mood::COUNT],
    dominant: Mood,
    dominant_count: usize,
}

impl MoodSmoother {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let mut counts = [0; Mood::COUNT];
        counts[Mood::Neutral.index()] = capacity;

        Self {
            window: std::iter::repeat(Mood::Neutral).take(capacity).collect(),
            counts,
            dominant: Mood::Neutral,
            dominant_count: capacity,
        }
    }

    /// Push one raw label and return the (possibly unchanged) dominant mood.
    pub fn update(&mut self, label: Mood) -> Mood {
        if let Some(evicted) = self.window.pop_front() {
            self.counts[evicted.index()] -= 1;
            if evicted == self.dominant {
                self.dominant_count -= 1;
            }
        }

        self.window.push_back(label);
        let count = &mut self.counts[label.index()];
        *count += 1;

        if *count > self.dominant_count {
            if label != self.dominant {
                debug!(from = %self.dominant, to = %label, count = *count, "dominant mood changed");
            }
            self.dominant = label;
            self.dominant_count = *count;
        }

        self.dominant
    }

    /// Parse a raw classifier label and feed it in. Invalid labels leave the
    /// window untouched.
    pub fn update_label(&mut self, label: &str) -> Result<Mood, MoodError> {
        let mood = label.parse::<Mood>()?;
        Ok(self.update(mood))
    }

    pub fn dominant(&self) -> Mood {
        self.dominant
    }

    pub fn count(&self, mood: Mood) -> usize {
        self.counts[mood.index()]
    }

    pub fn capacity(&self) -> usize {
        self.window.len()
    }

    /// Labels currently in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = Mood> + '_ {
        self.window.iter().copied()
    }
}

impl Default for MoodSmoother {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_WINDOW).expect("default window is non-zero"))
    }
}
