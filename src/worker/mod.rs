// Background mood worker - keeps blocking crossfades off the detection loop
//
// The engine lives on a dedicated blocking thread and is only ever touched
// from there. Callers talk to it through an unbounded channel, so moods are
// applied in the order they were sent. Moods that arrive during a crossfade
// wait in the queue until it finishes.

use crate::audio::{Clock, CrossfadeEngine, EngineError, PlaybackBackend, ShutdownSignal};
use crate::mood::Mood;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("audio engine failed to start: {0}")]
    Startup(#[source] EngineError),

    #[error("mood worker is no longer running")]
    Closed,

    #[error("mood worker failed: {0}")]
    Join(String),
}

/// What to do with moods that queued up behind a running crossfade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Skip straight to the newest queued mood.
    #[default]
    LatestWins,
    /// Play through every queued mood in order.
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub policy: QueuePolicy,
    pub join_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            policy: QueuePolicy::LatestWins,
            join_timeout_ms: 2000,
        }
    }
}

#[derive(Debug)]
enum WorkerCommand {
    SetMood(Mood),
    Shutdown,
}

pub struct MoodWorker {
    sender: mpsc::UnboundedSender<WorkerCommand>,
    signal: ShutdownSignal,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl MoodWorker {
    /// Start the worker. `factory` runs on the worker thread, so the engine
    /// and its backend never have to cross threads.
    pub async fn spawn<F, B, C>(factory: F, config: WorkerConfig) -> Result<Self, WorkerError>
    where
        F: FnOnce() -> Result<CrossfadeEngine<B, C>, EngineError> + Send + 'static,
        B: PlaybackBackend + 'static,
        C: Clock + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let policy = config.policy;

        let handle = tokio::task::spawn_blocking(move || {
            let mut engine = match factory() {
                Ok(engine) => engine,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(engine.shutdown_signal()));

            run(&mut engine, receiver, policy);

            if let Err(e) = engine.shutdown() {
                error!("Failed to shut down audio engine: {}", e);
            }
            debug!("mood worker exited");
        });

        let signal = match ready_rx.await {
            Ok(Ok(signal)) => signal,
            Ok(Err(e)) => {
                let _ = handle.await;
                return Err(WorkerError::Startup(e));
            }
            Err(_) => {
                // the factory panicked before reporting back
                let reason = match handle.await {
                    Err(e) => e.to_string(),
                    Ok(()) => "worker exited during startup".to_string(),
                };
                return Err(WorkerError::Join(reason));
            }
        };

        info!(?policy, "mood worker started");
        Ok(Self {
            sender,
            signal,
            handle: Some(handle),
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        })
    }

    /// Queue a mood change. Returns immediately.
    pub fn set_mood(&self, mood: Mood) -> Result<(), WorkerError> {
        self.sender
            .send(WorkerCommand::SetMood(mood))
            .map_err(|_| WorkerError::Closed)
    }

    /// Abort any running crossfade, stop the engine and wait (bounded) for the
    /// worker thread to finish.
    pub async fn shutdown(mut self) -> Result<(), WorkerError> {
        self.signal.raise();
        let _ = self.sender.send(WorkerCommand::Shutdown);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(())) => {
                info!("mood worker stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(WorkerError::Join(e.to_string())),
            Err(_) => {
                warn!(
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "mood worker did not exit in time, continuing shutdown"
                );
                Ok(())
            }
        }
    }
}

impl Drop for MoodWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.signal.raise();
            let _ = self.sender.send(WorkerCommand::Shutdown);
        }
    }
}

fn run<B: PlaybackBackend, C: Clock>(
    engine: &mut CrossfadeEngine<B, C>,
    mut receiver: mpsc::UnboundedReceiver<WorkerCommand>,
    policy: QueuePolicy,
) {
    let signal = engine.shutdown_signal();

    while let Some(command) = receiver.blocking_recv() {
        let mut mood = match command {
            WorkerCommand::SetMood(mood) => mood,
            WorkerCommand::Shutdown => break,
        };

        let mut shutdown_pending = false;
        if policy == QueuePolicy::LatestWins {
            while let Ok(next) = receiver.try_recv() {
                match next {
                    WorkerCommand::SetMood(newer) => {
                        debug!(dropped = %mood, newer = %newer, "superseded queued mood");
                        mood = newer;
                    }
                    WorkerCommand::Shutdown => {
                        shutdown_pending = true;
                        break;
                    }
                }
            }
        }

        if signal.is_raised() {
            break;
        }
        engine.set_mood(mood);

        if shutdown_pending || signal.is_raised() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{ManualClock, MockBackend};
    use crate::audio::{
        BackendError, CrossfadeConfig, EngineEvent, EngineEventKind, SystemClock, TrackCatalog,
    };
    use std::path::PathBuf;
    use std::time::Instant;

    fn catalog() -> TrackCatalog {
        let mut catalog = TrackCatalog::new();
        for mood in [Mood::Happy, Mood::Sad, Mood::Angry, Mood::Fear] {
            catalog.insert(mood, PathBuf::from(format!("{}.mp3", mood)));
        }
        catalog
    }

    fn backend() -> MockBackend {
        MockBackend::with_tracks(["happy.mp3", "sad.mp3", "angry.mp3", "fear.mp3"])
    }

    /// Blocks the first sleep until released, telling the test when it got there.
    struct GateClock {
        entered: Option<oneshot::Sender<()>>,
        release: Option<oneshot::Receiver<()>>,
    }

    impl Clock for GateClock {
        fn sleep(&mut self, _duration: Duration) {
            if let Some(entered) = self.entered.take() {
                let _ = entered.send(());
            }
            if let Some(release) = self.release.take() {
                let _ = release.blocking_recv();
            }
        }
    }

    /// Collect events until one matches `done` (inclusive).
    async fn collect_until<P>(events: &mut mpsc::UnboundedReceiver<EngineEvent>, done: P) -> Vec<EngineEvent>
    where
        P: Fn(&EngineEvent) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for engine events")
                .expect("event channel closed");
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    }

    fn completed(mood: Mood) -> impl Fn(&EngineEvent) -> bool {
        move |event: &EngineEvent| {
            matches!(event.kind, EngineEventKind::CrossfadeCompleted { .. }) && event.mood == Some(mood)
        }
    }

    async fn run_backlog(policy: QueuePolicy) -> (Vec<PathBuf>, MockBackend) {
        let backend = backend();
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let engine_backend = backend.clone();
        let worker = MoodWorker::spawn(
            move || {
                let clock = GateClock {
                    entered: Some(entered_tx),
                    release: Some(release_rx),
                };
                let mut engine =
                    CrossfadeEngine::with_clock(engine_backend, clock, catalog(), CrossfadeConfig::default());
                engine.subscribe(events_tx);
                Ok(engine)
            },
            WorkerConfig { policy, join_timeout_ms: 2000 },
        )
        .await
        .unwrap();

        worker.set_mood(Mood::Happy).unwrap();
        let mut events = collect_until(&mut events_rx, completed(Mood::Happy)).await;

        worker.set_mood(Mood::Sad).unwrap();
        // the sad crossfade is now parked on its first step
        entered_rx.await.unwrap();

        worker.set_mood(Mood::Angry).unwrap();
        worker.set_mood(Mood::Fear).unwrap();
        worker.set_mood(Mood::Happy).unwrap();
        release_tx.send(()).unwrap();

        events.extend(collect_until(&mut events_rx, completed(Mood::Happy)).await);
        worker.shutdown().await.unwrap();

        let tracks = events
            .into_iter()
            .filter_map(|event| match event.kind {
                EngineEventKind::TrackSelected { track } => Some(track),
                _ => None,
            })
            .collect();
        (tracks, backend)
    }

    #[tokio::test]
    async fn test_latest_wins_collapses_backlog() {
        let (tracks, backend) = run_backlog(QueuePolicy::LatestWins).await;

        assert_eq!(
            tracks,
            vec![PathBuf::from("happy.mp3"), PathBuf::from("sad.mp3"), PathBuf::from("happy.mp3")]
        );
        assert!(backend.state().shut_down);
    }

    #[tokio::test]
    async fn test_fifo_applies_every_mood_in_order() {
        let (tracks, backend) = run_backlog(QueuePolicy::Fifo).await;

        let names: Vec<PathBuf> = ["happy", "sad", "angry", "fear", "happy"]
            .iter()
            .map(|m| PathBuf::from(format!("{}.mp3", m)))
            .collect();
        assert_eq!(tracks, names);
        assert!(backend.audible().is_empty());
        assert_eq!(backend.state().shutdowns, 1);
    }

    #[tokio::test]
    async fn test_startup_failure_is_reported() {
        let result = MoodWorker::spawn(
            || -> Result<CrossfadeEngine<MockBackend, ManualClock>, EngineError> {
                Err(BackendError::Unavailable("no output device".to_string()).into())
            },
            WorkerConfig::default(),
        )
        .await;

        match result {
            Err(WorkerError::Startup(EngineError::Backend(BackendError::Unavailable(reason)))) => {
                assert_eq!(reason, "no output device");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("worker should not start"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_crossfade() {
        let backend = backend();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let engine_backend = backend.clone();

        // a 10 second ramp that shutdown has to cut short
        let config = CrossfadeConfig { duration_ms: 10_000, steps: 1000 };
        let worker = MoodWorker::spawn(
            move || {
                let mut engine =
                    CrossfadeEngine::with_clock(engine_backend, SystemClock, catalog(), config);
                engine.subscribe(events_tx);
                Ok(engine)
            },
            WorkerConfig::default(),
        )
        .await
        .unwrap();

        worker.set_mood(Mood::Happy).unwrap();
        collect_until(&mut events_rx, completed(Mood::Happy)).await;
        worker.set_mood(Mood::Sad).unwrap();
        collect_until(&mut events_rx, |e| {
            matches!(e.kind, EngineEventKind::CrossfadeStarted { .. })
        })
        .await;

        let started = Instant::now();
        worker.shutdown().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(backend.audible().is_empty());
        assert!(backend.state().shut_down);
    }

    #[tokio::test]
    async fn test_join_timeout_is_not_fatal() {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let engine_backend = backend();

        // fifo so the two moods cannot collapse into one cold start
        let worker = MoodWorker::spawn(
            move || {
                let clock = GateClock {
                    entered: Some(entered_tx),
                    release: Some(release_rx),
                };
                Ok(CrossfadeEngine::with_clock(engine_backend, clock, catalog(), CrossfadeConfig::default()))
            },
            WorkerConfig { policy: QueuePolicy::Fifo, join_timeout_ms: 50 },
        )
        .await
        .unwrap();

        worker.set_mood(Mood::Happy).unwrap();
        worker.set_mood(Mood::Sad).unwrap();
        entered_rx.await.unwrap();

        // the worker is stuck inside a step, so the join times out
        worker.shutdown().await.unwrap();

        // unblock it so the runtime can wind down
        release_tx.send(()).unwrap();
    }
}
