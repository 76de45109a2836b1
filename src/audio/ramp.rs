use std::num::NonZeroU32;
use std::time::Duration;

/// Paces the crossfade. Real playback sleeps; tests record instead.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Linear crossfade volumes, `(old, new)` for `i` in `0..=steps`.
///
/// Yields `steps + 1` pairs: `(1 - i/steps, i/steps)`. Equal-power curves are
/// deliberately not used.
#[derive(Debug, Clone)]
pub struct CrossfadeRamp {
    steps: u32,
    next: u32,
}

impl CrossfadeRamp {
    pub fn new(steps: NonZeroU32) -> Self {
        Self {
            steps: steps.get(),
            next: 0,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }
}

impl Iterator for CrossfadeRamp {
    type Item = (f32, f32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.steps {
            return None;
        }
        let progress = self.next as f32 / self.steps as f32;
        self.next += 1;
        Some((1.0 - progress, progress))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CrossfadeRamp {}
