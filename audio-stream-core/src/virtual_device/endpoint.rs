use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::{InitError, StreamError};
use crate::models::format::{AudioFormat, BufferInfo, NegotiatedFormat};
use crate::models::frame::Direction;
use crate::processing::sample_codec;
use crate::traits::endpoint::{AudioClient, Endpoint};
use crate::traits::transport::{CapturePacket, CaptureTransport, RenderFlags, RenderTransport};

use super::probe::VirtualProbe;

/// Capture source: frame ordinal → sample, written to every channel.
pub type SignalFn = Arc<dyn Fn(u64) -> f32 + Send + Sync + 'static>;

const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    fail_activation: bool,
    without_service: bool,
    reject_formats: bool,
    transport_fail_after: Option<u64>,
    silent_every: Option<u64>,
}

/// Software endpoint with a real-time clock.
///
/// Only the mix format is supported natively; any other requested format
/// is substituted with it.
#[derive(Clone)]
pub struct VirtualEndpoint {
    id: String,
    direction: Direction,
    mix_format: AudioFormat,
    period: Duration,
    signal: SignalFn,
    faults: Faults,
    probe: VirtualProbe,
}

impl VirtualEndpoint {
    pub fn capture(id: impl Into<String>, mix_format: AudioFormat) -> Self {
        Self::new(id.into(), Direction::Capture, mix_format)
    }

    pub fn render(id: impl Into<String>, mix_format: AudioFormat) -> Self {
        Self::new(id.into(), Direction::Render, mix_format)
    }

    fn new(id: String, direction: Direction, mix_format: AudioFormat) -> Self {
        Self {
            id,
            direction,
            mix_format,
            period: DEFAULT_PERIOD,
            signal: Arc::new(|_| 0.0),
            faults: Faults::default(),
            probe: VirtualProbe::default(),
        }
    }

    /// Source for captured samples.
    pub fn with_signal(mut self, signal: SignalFn) -> Self {
        self.signal = signal;
        self
    }

    /// Device period; capture packets are exactly one period long.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn fail_activation(mut self) -> Self {
        self.faults.fail_activation = true;
        self
    }

    /// Activated clients cannot provide a transport service.
    pub fn without_service(mut self) -> Self {
        self.faults.without_service = true;
        self
    }

    /// Negotiation fails outright instead of substituting.
    pub fn reject_formats(mut self) -> Self {
        self.faults.reject_formats = true;
        self
    }

    /// Every transport fails once it has moved `packets` packets.
    pub fn fail_transport_after(mut self, packets: u64) -> Self {
        self.faults.transport_fail_after = Some(packets);
        self
    }

    /// Every `n`th capture packet carries the silent flag.
    pub fn silent_every(mut self, n: u64) -> Self {
        self.faults.silent_every = Some(n.max(1));
        self
    }

    pub fn probe(&self) -> VirtualProbe {
        self.probe.clone()
    }

    pub fn mix_format(&self) -> AudioFormat {
        self.mix_format
    }
}

impl Endpoint for VirtualEndpoint {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn activate(&self) -> Result<Box<dyn AudioClient>, InitError> {
        if self.faults.fail_activation {
            return Err(InitError::ActivationFailed(format!("{} is unavailable", self.id)));
        }
        self.probe.record_activation();
        log::debug!("activated virtual {} endpoint {}", self.direction, self.id);
        Ok(Box::new(VirtualClient {
            endpoint: self.clone(),
            stream: None,
        }))
    }
}

/// Monotonic device clock that only advances while running.
#[derive(Debug)]
struct DeviceClock {
    sample_rate: u32,
    accumulated: Duration,
    started: Option<Instant>,
}

impl DeviceClock {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            accumulated: Duration::ZERO,
            started: None,
        }
    }

    /// Frames elapsed on the device since the last reset.
    fn position(&self) -> u64 {
        let running = self.started.map(|s| s.elapsed()).unwrap_or_default();
        let elapsed = self.accumulated + running;
        (elapsed.as_nanos() * self.sample_rate as u128 / 1_000_000_000) as u64
    }

    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

/// State shared between a client and the transport it hands out.
#[derive(Debug)]
struct DeviceStream {
    clock: DeviceClock,
    /// Capture: frames already read. Render: clock position at the last drain.
    cursor: u64,
    /// Render: frames written and not yet played.
    queued: u64,
}

impl DeviceStream {
    /// Render side: let the device consume what the clock has played.
    fn drain(&mut self) -> u64 {
        let position = self.clock.position();
        let played = position.saturating_sub(self.cursor);
        self.cursor = position;
        self.queued = self.queued.saturating_sub(played);
        self.queued
    }
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    format: AudioFormat,
    buffer_frames: u32,
    period_frames: u32,
}

struct VirtualClient {
    endpoint: VirtualEndpoint,
    stream: Option<(Geometry, Arc<Mutex<DeviceStream>>)>,
}

impl VirtualClient {
    fn stream(&self) -> Result<&(Geometry, Arc<Mutex<DeviceStream>>), InitError> {
        self.stream
            .as_ref()
            .ok_or_else(|| InitError::ServiceUnavailable("client is not initialized".into()))
    }

    fn check_service(&self, direction: Direction) -> Result<(), InitError> {
        if self.endpoint.faults.without_service {
            return Err(InitError::ServiceUnavailable(format!(
                "{} exposes no {} service",
                self.endpoint.id, direction
            )));
        }
        if self.endpoint.direction != direction {
            return Err(InitError::ServiceUnavailable(format!(
                "{} is a {} endpoint",
                self.endpoint.id, self.endpoint.direction
            )));
        }
        Ok(())
    }

    fn running(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|(_, stream)| stream.lock().clock.started.is_some())
    }
}

impl AudioClient for VirtualClient {
    fn mix_format(&mut self) -> Result<AudioFormat, InitError> {
        Ok(self.endpoint.mix_format)
    }

    fn negotiate(&mut self, desired: &AudioFormat) -> Result<NegotiatedFormat, InitError> {
        if self.endpoint.faults.reject_formats {
            return Err(InitError::FormatUnsupported(format!(
                "{} rejects {}",
                self.endpoint.id, desired
            )));
        }
        if *desired == self.endpoint.mix_format {
            Ok(NegotiatedFormat::Accepted(*desired))
        } else {
            Ok(NegotiatedFormat::Substituted {
                requested: *desired,
                actual: self.endpoint.mix_format,
            })
        }
    }

    fn initialize(&mut self, format: &AudioFormat, buffer_duration: Duration) -> Result<BufferInfo, InitError> {
        if self.stream.is_some() {
            return Err(InitError::InvalidConfiguration("client already initialized".into()));
        }
        if *format != self.endpoint.mix_format {
            return Err(InitError::FormatUnsupported(format.to_string()));
        }

        let period_frames = format.duration_to_frames(self.endpoint.period).max(1) as u32;
        let requested = format.duration_to_frames(buffer_duration) as u32;
        let buffer_frames = requested.max(period_frames);
        let geometry = Geometry {
            format: *format,
            buffer_frames,
            period_frames,
        };
        let stream = DeviceStream {
            clock: DeviceClock::new(format.sample_rate),
            cursor: 0,
            queued: 0,
        };
        self.stream = Some((geometry, Arc::new(Mutex::new(stream))));

        Ok(BufferInfo {
            buffer_frames,
            latency: format.frames_to_duration(buffer_frames as u64),
        })
    }

    fn capture_transport(&mut self) -> Result<Box<dyn CaptureTransport>, InitError> {
        self.check_service(Direction::Capture)?;
        let (geometry, stream) = self.stream()?;
        Ok(Box::new(VirtualCapture {
            geometry: *geometry,
            stream: Arc::clone(stream),
            signal: Arc::clone(&self.endpoint.signal),
            faults: self.endpoint.faults,
            packets: 0,
            scratch: Vec::new(),
        }))
    }

    fn render_transport(&mut self) -> Result<Box<dyn RenderTransport>, InitError> {
        self.check_service(Direction::Render)?;
        let (geometry, stream) = self.stream()?;
        Ok(Box::new(VirtualRender {
            geometry: *geometry,
            stream: Arc::clone(stream),
            probe: self.endpoint.probe.clone(),
            faults: self.endpoint.faults,
            packets: 0,
            region: Vec::new(),
            decoded: Vec::new(),
        }))
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let (_, stream) = self.stream.as_ref().ok_or(StreamError::NotInitialized)?;
        stream.lock().clock.start();
        self.endpoint.probe.record_start();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        let (_, stream) = self.stream.as_ref().ok_or(StreamError::NotInitialized)?;
        stream.lock().clock.stop();
        self.endpoint.probe.record_stop();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StreamError> {
        if self.running() {
            return Err(StreamError::InvalidState("cannot reset a running stream".into()));
        }
        let (_, stream) = self.stream.as_ref().ok_or(StreamError::NotInitialized)?;
        let mut stream = stream.lock();
        stream.clock.reset();
        stream.cursor = 0;
        stream.queued = 0;
        self.endpoint.probe.record_reset();
        Ok(())
    }
}

fn check_fault(faults: &Faults, packets: u64) -> Result<(), StreamError> {
    match faults.transport_fail_after {
        Some(limit) if packets >= limit => Err(StreamError::Transport(format!(
            "device invalidated after {} packets",
            packets
        ))),
        _ => Ok(()),
    }
}

struct VirtualCapture {
    geometry: Geometry,
    stream: Arc<Mutex<DeviceStream>>,
    signal: SignalFn,
    faults: Faults,
    packets: u64,
    scratch: Vec<u8>,
}

impl VirtualCapture {
    /// Frames captured and not yet read, after overrun drops.
    fn pending(&self, stream: &mut DeviceStream) -> u64 {
        let period = self.geometry.period_frames as u64;
        let buffer = self.geometry.buffer_frames as u64;
        // The packet being assembled does not count against the buffer.
        let capacity = buffer + period;
        let produced = stream.clock.position();
        let mut pending = produced.saturating_sub(stream.cursor);
        if pending > capacity {
            let skip = (pending - capacity).div_ceil(period) * period;
            log::trace!("virtual capture overrun, dropping {} frames", skip);
            stream.cursor += skip;
            pending -= skip;
        }
        pending
    }
}

impl CaptureTransport for VirtualCapture {
    fn next_packet_frames(&mut self) -> Result<u32, StreamError> {
        check_fault(&self.faults, self.packets)?;
        let stream = Arc::clone(&self.stream);
        let mut stream = stream.lock();
        let period = self.geometry.period_frames;
        Ok(if self.pending(&mut stream) >= period as u64 { period } else { 0 })
    }

    fn read_packet(&mut self, read: &mut dyn FnMut(CapturePacket<'_>)) -> Result<u32, StreamError> {
        check_fault(&self.faults, self.packets)?;
        let stream = Arc::clone(&self.stream);
        let mut stream = stream.lock();
        let period = self.geometry.period_frames;
        if self.pending(&mut stream) < period as u64 {
            return Ok(0);
        }

        let first = stream.cursor;
        let index = first / period as u64;
        let silent = self.faults.silent_every.is_some_and(|n| index % n == n - 1);

        let format = self.geometry.format;
        let block_align = format.block_align();
        self.scratch.clear();
        self.scratch.resize(period as usize * block_align, 0);
        if !silent {
            for (offset, frame) in self.scratch.chunks_exact_mut(block_align).enumerate() {
                let sample = (self.signal)(first + offset as u64);
                sample_codec::encode_frame(sample, format.representation, frame);
            }
        }

        read(CapturePacket {
            data: &self.scratch,
            frames: period,
            silent,
        });
        stream.cursor += period as u64;
        self.packets += 1;
        Ok(period)
    }
}

struct VirtualRender {
    geometry: Geometry,
    stream: Arc<Mutex<DeviceStream>>,
    probe: VirtualProbe,
    faults: Faults,
    packets: u64,
    region: Vec<u8>,
    decoded: Vec<f32>,
}

impl RenderTransport for VirtualRender {
    fn buffer_frames(&self) -> u32 {
        self.geometry.buffer_frames
    }

    fn current_padding(&mut self) -> Result<u32, StreamError> {
        check_fault(&self.faults, self.packets)?;
        Ok(self.stream.lock().drain() as u32)
    }

    fn write_frames(
        &mut self,
        frames: u32,
        fill: &mut dyn FnMut(&mut [u8]) -> RenderFlags,
    ) -> Result<(), StreamError> {
        check_fault(&self.faults, self.packets)?;
        let stream = Arc::clone(&self.stream);
        let mut stream = stream.lock();
        let free = (self.geometry.buffer_frames as u64).saturating_sub(stream.drain());
        if frames as u64 > free {
            return Err(StreamError::Transport(format!(
                "requested {} frames with only {} free",
                frames, free
            )));
        }

        let format = self.geometry.format;
        self.region.clear();
        self.region.resize(frames as usize * format.block_align(), 0);
        let flags = fill(&mut self.region);

        self.decoded.clear();
        let silent_frames = match flags {
            RenderFlags::Data => {
                sample_codec::decode_into(&self.region, format.representation, &mut self.decoded);
                0
            }
            RenderFlags::Silent => {
                self.decoded.resize(frames as usize * format.channels as usize, 0.0);
                frames as u64
            }
        };
        self.probe.record_rendered(&self.decoded, silent_frames);

        stream.queued += frames as u64;
        self.packets += 1;
        Ok(())
    }
}
