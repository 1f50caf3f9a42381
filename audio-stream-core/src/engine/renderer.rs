use std::sync::atomic::Ordering;

use crate::models::config::StreamConfiguration;
use crate::models::error::{InitError, StreamError};
use crate::models::format::AudioFormat;
use crate::models::frame::FrameInfo;
use crate::models::state::{EngineCounters, EngineStats, StreamSession, StreamStatus};
use crate::processing::bridge::SampleBridge;
use crate::processing::sample_codec;
use crate::traits::endpoint::Endpoint;
use crate::traits::transport::{RenderFlags, RenderTransport};

use super::stream_engine::{PollWorker, StreamEngine};

/// Per-frame render callback. The returned sample is written to every
/// channel of the frame.
pub type FrameCallback = Box<dyn FnMut(FrameInfo) -> f32 + Send + 'static>;

struct RenderWorker {
    format: AudioFormat,
    callback: FrameCallback,
    ordinal: u64,
}

impl RenderWorker {
    fn fill(&mut self, region: &mut [u8]) {
        let block_align = self.format.block_align();
        let rate = self.format.sample_rate as f64;
        for frame in region.chunks_exact_mut(block_align) {
            let info = FrameInfo {
                elapsed_secs: self.ordinal as f64 / rate,
                ordinal: self.ordinal,
            };
            let sample = (self.callback)(info);
            sample_codec::encode_frame(sample, self.format.representation, frame);
            self.ordinal += 1;
        }
    }
}

impl PollWorker<Box<dyn RenderTransport>> for RenderWorker {
    fn tick(&mut self, transport: &mut Box<dyn RenderTransport>, counters: &EngineCounters) -> Result<(), StreamError> {
        let available = transport.available_frames()?;
        if available == 0 {
            return Ok(());
        }

        transport.write_frames(available, &mut |region| {
            self.fill(region);
            RenderFlags::Data
        })?;
        counters.frames.fetch_add(available as u64, Ordering::Relaxed);
        Ok(())
    }

    fn finish(self, outcome: &Result<(), StreamError>) {
        if outcome.is_ok() {
            log::debug!("render loop exited after {} frames", self.ordinal);
        }
    }
}

/// Fill whatever the hardware can take with a silent region so the stream
/// does not start on stale buffer contents.
fn prime_with_silence(transport: &mut Box<dyn RenderTransport>) -> Result<(), StreamError> {
    let available = transport.available_frames()?;
    if available == 0 {
        return Ok(());
    }
    transport.write_frames(available, &mut |region| {
        region.fill(0);
        RenderFlags::Silent
    })
}

/// Render engine: asks a per-frame callback for every sample the hardware
/// can accept on each tick.
pub struct Renderer<E: Endpoint> {
    engine: StreamEngine<E, Box<dyn RenderTransport>>,
}

impl<E: Endpoint> Renderer<E> {
    pub fn new(endpoint: E) -> Self {
        Self::with_config(endpoint, StreamConfiguration::default())
    }

    pub fn with_config(endpoint: E, config: StreamConfiguration) -> Self {
        Self {
            engine: StreamEngine::new(endpoint, config),
        }
    }

    pub fn initialize(&mut self, buffer_duration_ms: u32) -> Result<(), InitError> {
        self.engine.initialize(buffer_duration_ms)
    }

    pub fn initialize_from_config(&mut self) -> Result<(), InitError> {
        self.engine.initialize_from_config()
    }

    /// Start rendering. `callback` is invoked once per frame with strictly
    /// increasing ordinals starting at 0; its value is duplicated across
    /// all channels. No-op while already running.
    pub fn start<F>(&mut self, callback: F) -> Result<(), StreamError>
    where
        F: FnMut(FrameInfo) -> f32 + Send + 'static,
    {
        let prime = self.engine.config().prime_with_silence;
        let callback: FrameCallback = Box::new(callback);
        self.engine.launch(
            |transport, _| if prime { prime_with_silence(transport) } else { Ok(()) },
            move |format| RenderWorker {
                format: *format,
                callback,
                ordinal: 0,
            },
        )?;
        Ok(())
    }

    /// Render samples popped from a bridge, one per frame; an empty bridge
    /// renders silence.
    pub fn start_from_bridge(&mut self, bridge: &SampleBridge) -> Result<(), StreamError> {
        let bridge = bridge.clone();
        self.start(move |_| bridge.pop())
    }

    pub fn stop(&mut self) -> Result<(), StreamError> {
        self.engine.stop()
    }

    /// Discard buffered hardware data and the stream position.
    ///
    /// Only valid while idle.
    pub fn reset(&mut self) -> Result<(), StreamError> {
        let client = self.engine.idle_client().inspect_err(|e| {
            log::warn!("render reset rejected: {}", e);
        })?;
        client.reset()
    }

    pub fn status(&self) -> StreamStatus {
        self.engine.status()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.engine.format()
    }

    pub fn session(&self) -> Option<StreamSession> {
        self.engine.session()
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.engine.last_error()
    }

    pub fn endpoint(&self) -> &E {
        self.engine.endpoint()
    }
}
