use super::{
    AudioFormat, BackendError, ChannelId, CrossfadeConfig, CrossfadeEngine, EngineError,
    PlaybackBackend, TrackCatalog,
};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Local playback through the default output device, one `Sink` per channel.
///
/// The output stream is not `Send`, so the backend has to live on the thread
/// that created it. The worker builds its engine in place for that reason.
pub struct RodioBackend {
    stream: Option<OutputStream>,
    stream_handle: OutputStreamHandle,
    sinks: [Option<Sink>; 2],
}

impl RodioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| BackendError::Unavailable(e.to_string()))?;
        info!("Opened default audio output");

        Ok(Self {
            stream: Some(stream),
            stream_handle,
            sinks: [None, None],
        })
    }

    fn sink(&self, channel: ChannelId) -> Result<&Sink, BackendError> {
        self.sinks[channel.index()]
            .as_ref()
            .ok_or_else(|| BackendError::Channel(format!("nothing loaded on channel {}", channel)))
    }
}

impl PlaybackBackend for RodioBackend {
    fn is_resolvable(&self, track: &Path) -> bool {
        track.is_file() && AudioFormat::from_path(track).is_supported()
    }

    fn load_looped(&mut self, channel: ChannelId, track: &Path, volume: f32) -> Result<(), BackendError> {
        if self.stream.is_none() {
            return Err(BackendError::Unavailable("audio output already released".to_string()));
        }

        let load_err = |reason: String| BackendError::Load {
            track: track.to_path_buf(),
            reason,
        };

        let file = File::open(track).map_err(|e| load_err(format!("failed to open file: {}", e)))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| load_err(format!("unsupported audio format or corrupted file: {}", e)))?;

        let sink = Sink::try_new(&self.stream_handle).map_err(|e| load_err(e.to_string()))?;
        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source.repeat_infinite());

        if let Some(previous) = self.sinks[channel.index()].replace(sink) {
            previous.stop();
        }

        debug!(channel = %channel, track = %track.display(), volume, "loaded track");
        Ok(())
    }

    fn set_volume(&mut self, channel: ChannelId, volume: f32) -> Result<(), BackendError> {
        self.sink(channel)?.set_volume(volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(sink) = self.sinks[channel.index()].take() {
            sink.stop();
        }
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        for channel in ChannelId::BOTH {
            self.stop(channel);
        }
        if self.stream.take().is_some() {
            info!("Released audio output");
        }
        Ok(())
    }
}

impl CrossfadeEngine<RodioBackend> {
    /// Engine on the default output device. Fails if no device can be opened.
    pub fn with_default_output(catalog: TrackCatalog, config: CrossfadeConfig) -> Result<Self, EngineError> {
        let backend = RodioBackend::new()?;
        Ok(Self::new(backend, catalog, config))
    }
}
