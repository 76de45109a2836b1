// MoodMuse library - debounced mood detection driving crossfaded background music
// The frame loop feeds raw labels in; everything about audio stays behind the engine

pub mod audio;    // catalog, backends, crossfade engine
pub mod config;   // TOML settings with defaults
pub mod mood;     // mood labels and the majority-vote smoother
pub mod pipeline; // smoother -> engine glue for the frame loop
pub mod worker;   // background thread that owns the engine

// Export the stuff callers actually use
pub use audio::{CrossfadeConfig, CrossfadeEngine, EngineEvent, EngineState, PlaybackBackend, TrackCatalog};
#[cfg(feature = "audio")]
pub use audio::RodioBackend;
pub use config::Config;
pub use mood::{Mood, MoodError, MoodSmoother};
pub use pipeline::{MoodPipeline, MoodSink};
pub use worker::{MoodWorker, QueuePolicy, WorkerConfig};
