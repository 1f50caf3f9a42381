use std::sync::atomic::Ordering;

use chrono::Utc;

use crate::models::config::{SilentPacketPolicy, StreamConfiguration};
use crate::models::error::{InitError, StreamError};
use crate::models::format::AudioFormat;
use crate::models::recording::CapturedRecording;
use crate::models::state::{EngineCounters, EngineStats, StreamSession, StreamStatus};
use crate::processing::bridge::SampleBridge;
use crate::processing::sample_codec;
use crate::traits::endpoint::Endpoint;
use crate::traits::transport::CaptureTransport;

use super::handle::{RecordingHandle, RecordingSender};
use super::stream_engine::{PollWorker, StreamEngine};

/// Callback receiving every captured span of interleaved samples.
///
/// Runs synchronously on the capture thread; it must be cheap and must
/// never block.
pub type SampleSpanCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Destination for decoded capture spans.
trait CaptureSink: Send + 'static {
    fn deliver(&mut self, samples: &[f32]);

    fn finish(self, outcome: &Result<(), StreamError>);
}

/// Accumulates a whole recording and resolves the handle on exit.
struct RecordingSink {
    format: AudioFormat,
    started_at: chrono::DateTime<Utc>,
    samples: Vec<f32>,
    sender: RecordingSender,
}

impl CaptureSink for RecordingSink {
    fn deliver(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    fn finish(self, outcome: &Result<(), StreamError>) {
        let result = match outcome {
            Ok(()) => Ok(CapturedRecording::new(self.format, self.started_at, self.samples)),
            Err(e) => Err(e.clone()),
        };
        // The caller may have dropped the handle; nothing to deliver to then.
        let _ = self.sender.send(result);
    }
}

/// Forwards each span straight to a caller-supplied callback.
struct StreamingSink(SampleSpanCallback);

impl CaptureSink for StreamingSink {
    fn deliver(&mut self, samples: &[f32]) {
        (self.0)(samples)
    }

    fn finish(self, _outcome: &Result<(), StreamError>) {}
}

struct CaptureWorker<S: CaptureSink> {
    format: AudioFormat,
    silent_packets: SilentPacketPolicy,
    scratch: Vec<f32>,
    sink: S,
}

impl<S: CaptureSink> PollWorker<Box<dyn CaptureTransport>> for CaptureWorker<S> {
    /// Drain every packet queued since the last tick.
    fn tick(&mut self, transport: &mut Box<dyn CaptureTransport>, counters: &EngineCounters) -> Result<(), StreamError> {
        let format = self.format;
        let policy = self.silent_packets;
        let scratch = &mut self.scratch;
        let sink = &mut self.sink;

        let mut packet_frames = transport.next_packet_frames()?;
        while packet_frames > 0 {
            let released = transport.read_packet(&mut |packet| {
                let samples = packet.frames as usize * format.channels as usize;
                scratch.clear();

                if packet.silent {
                    counters.silent_packets.fetch_add(1, Ordering::Relaxed);
                    match policy {
                        SilentPacketPolicy::Skip => return,
                        SilentPacketPolicy::Zeros => scratch.resize(samples, 0.0),
                    }
                } else {
                    let block_align = format.block_align();
                    let bytes = packet.data.len().min(packet.frames as usize * block_align);
                    let whole = bytes / block_align * block_align;
                    sample_codec::decode_into(&packet.data[..whole], format.representation, scratch);
                }

                if !scratch.is_empty() {
                    sink.deliver(scratch);
                }
            })?;

            counters.frames.fetch_add(released as u64, Ordering::Relaxed);
            packet_frames = transport.next_packet_frames()?;
        }
        Ok(())
    }

    fn finish(self, outcome: &Result<(), StreamError>) {
        self.sink.finish(outcome);
    }
}

/// Capture engine: drains hardware packets into application memory.
pub struct Capturer<E: Endpoint> {
    engine: StreamEngine<E, Box<dyn CaptureTransport>>,
}

impl<E: Endpoint> Capturer<E> {
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

    /// Initialize with the configured `buffer_duration_ms`.
    pub fn initialize_from_config(&mut self) -> Result<(), InitError> {
        self.engine.initialize_from_config()
    }

    /// Start accumulating every captured sample.
    ///
    /// The handle resolves with the complete recording once `stop` is
    /// called. Calling this while already running returns a rejected
    /// handle and leaves the current session untouched.
    pub fn start_recording(&mut self) -> Result<RecordingHandle, StreamError> {
        let (sender, handle) = RecordingHandle::channel();
        let silent_packets = self.engine.config().silent_packets;

        let launched = self.engine.launch(
            |_, _| Ok(()),
            move |format| CaptureWorker {
                format: *format,
                silent_packets,
                scratch: Vec::new(),
                sink: RecordingSink {
                    format: *format,
                    started_at: Utc::now(),
                    samples: Vec::new(),
                    sender,
                },
            },
        )?;

        Ok(if launched { handle } else { RecordingHandle::rejected() })
    }

    /// Start forwarding each captured span to `callback`, unbuffered.
    ///
    /// No-op while already running.
    pub fn start_streaming<F>(&mut self, callback: F) -> Result<(), StreamError>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let silent_packets = self.engine.config().silent_packets;
        let callback: SampleSpanCallback = Box::new(callback);
        self.engine.launch(
            |_, _| Ok(()),
            move |format| CaptureWorker {
                format: *format,
                silent_packets,
                scratch: Vec::new(),
                sink: StreamingSink(callback),
            },
        )?;
        Ok(())
    }

    /// Stream captured spans into a bridge for a renderer to drain.
    pub fn start_streaming_into(&mut self, bridge: &SampleBridge) -> Result<(), StreamError> {
        let bridge = bridge.clone();
        self.start_streaming(move |samples| bridge.push(samples))
    }

    /// Stop capturing. Resolves any pending recording handle.
    pub fn stop(&mut self) -> Result<(), StreamError> {
        self.engine.stop()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;
    use crate::traits::transport::CapturePacket;
    use crate::virtual_device::VirtualEndpoint;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn mic() -> VirtualEndpoint {
        VirtualEndpoint::capture("virtual-mic", AudioFormat::float_stereo(48000))
    }

    #[test]
    fn recording_duration_tracks_wall_clock() {
        let mut capturer = Capturer::new(mic());
        capturer.initialize(16).unwrap();

        let handle = capturer.start_recording().unwrap();
        let started = Instant::now();
        thread::sleep(Duration::from_millis(200));
        capturer.stop().unwrap();
        let elapsed = started.elapsed();

        let recording = handle.wait().unwrap();
        assert_eq!(recording.format, AudioFormat::float_stereo(48000));
        assert!(recording.duration_secs() >= 0.15, "recorded {}s", recording.duration_secs());
        assert!(recording.duration_secs() <= elapsed.as_secs_f64() + 0.011);
        assert_eq!(recording.samples.len() % 2, 0);
        assert_eq!(capturer.status(), StreamStatus::Idle);
    }

    #[test]
    fn recording_preserves_signal_order() {
        let endpoint = mic().with_signal(Arc::new(|n| (n % 1000) as f32 / 1000.0));
        let mut capturer = Capturer::new(endpoint);
        capturer.initialize(100).unwrap();

        let handle = capturer.start_recording().unwrap();
        thread::sleep(Duration::from_millis(150));
        capturer.stop().unwrap();

        let recording = handle.wait().unwrap();
        assert!(!recording.is_empty());
        let left = recording.channel(0);
        let right = recording.channel(1);
        assert_eq!(left, right);
        for (n, sample) in left.iter().enumerate() {
            assert_relative_eq!(*sample, (n % 1000) as f32 / 1000.0);
        }
    }

    #[test]
    fn start_while_running_returns_rejected_handle() {
        let mut capturer = Capturer::new(mic());
        capturer.initialize(16).unwrap();

        let first = capturer.start_recording().unwrap();
        let second = capturer.start_recording().unwrap();
        assert!(!first.is_rejected());
        assert!(second.is_rejected());
        assert_eq!(capturer.status(), StreamStatus::Running);
        assert_eq!(capturer.endpoint().probe().starts(), 1);

        capturer.stop().unwrap();
        assert!(first.wait().is_ok());
        assert_eq!(second.wait(), Err(StreamError::AlreadyRunning));
    }

    #[test]
    fn start_before_initialize_fails() {
        let mut capturer = Capturer::new(mic());
        assert_eq!(capturer.start_recording().unwrap_err(), StreamError::NotInitialized);
        assert_eq!(capturer.status(), StreamStatus::Idle);
    }

    #[test]
    fn stop_while_idle_is_immediate() {
        let mut capturer = Capturer::new(mic());
        let started = Instant::now();
        capturer.stop().unwrap();
        capturer.initialize(16).unwrap();
        capturer.stop().unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(capturer.endpoint().probe().stops(), 0);
    }

    #[test]
    fn initialize_errors_are_reported() {
        let mut capturer = Capturer::new(mic().fail_activation());
        assert!(matches!(capturer.initialize(16), Err(InitError::ActivationFailed(_))));

        let mut capturer = Capturer::new(mic().reject_formats());
        assert!(matches!(capturer.initialize(16), Err(InitError::FormatUnsupported(_))));

        let mut capturer = Capturer::new(mic().without_service());
        assert!(matches!(capturer.initialize(16), Err(InitError::ServiceUnavailable(_))));
        assert!(capturer.format().is_none());

        let mut capturer = Capturer::new(mic());
        assert!(matches!(capturer.initialize(0), Err(InitError::InvalidConfiguration(_))));
    }

    #[test]
    fn render_endpoint_cannot_capture() {
        let speaker = VirtualEndpoint::render("virtual-speaker", AudioFormat::float_stereo(48000));
        let mut capturer = Capturer::new(speaker);
        assert!(matches!(capturer.initialize(16), Err(InitError::ServiceUnavailable(_))));
    }

    #[test]
    fn substituted_format_is_used() {
        let requested = AudioFormat::new(1, 16000, SampleRepresentation::Int16);
        let config = StreamConfiguration {
            desired_format: Some(requested),
            ..Default::default()
        };
        let mut capturer = Capturer::with_config(mic(), config);
        capturer.initialize(16).unwrap();
        assert_eq!(capturer.format(), Some(AudioFormat::float_stereo(48000)));

        let session = capturer.session().unwrap();
        assert_eq!(session.hardware_buffer_frames, 768);
        assert_relative_eq!(session.poll_interval.as_secs_f64(), 0.008, epsilon = 1e-6);
    }

    #[test]
    fn silent_packets_are_skipped_by_default() {
        let endpoint = mic().with_signal(Arc::new(|_| 0.5)).silent_every(2);
        let mut capturer = Capturer::new(endpoint);
        capturer.initialize(20).unwrap();

        let handle = capturer.start_recording().unwrap();
        thread::sleep(Duration::from_millis(80));
        capturer.stop().unwrap();

        let stats = capturer.stats();
        let recording = handle.wait().unwrap();
        assert!(stats.silent_packets > 0);
        assert!(recording.samples.iter().all(|&s| s == 0.5));
        assert!((recording.frames() as u64) < stats.frames);
    }

    #[test]
    fn silent_packets_can_be_zero_filled() {
        let endpoint = mic().with_signal(Arc::new(|_| 0.5)).silent_every(2);
        let config = StreamConfiguration {
            silent_packets: SilentPacketPolicy::Zeros,
            ..Default::default()
        };
        let mut capturer = Capturer::with_config(endpoint, config);
        capturer.initialize(20).unwrap();

        let handle = capturer.start_recording().unwrap();
        thread::sleep(Duration::from_millis(80));
        capturer.stop().unwrap();

        let stats = capturer.stats();
        let recording = handle.wait().unwrap();
        assert!(stats.silent_packets > 0);
        assert_eq!(recording.frames() as u64, stats.frames);
        assert!(recording.samples.iter().any(|&s| s == 0.0));
        assert!(recording.samples.iter().any(|&s| s == 0.5));
    }

    #[test]
    fn streaming_delivers_whole_frames() {
        let mut capturer = Capturer::new(mic());
        capturer.initialize(16).unwrap();

        let spans = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&spans);
        capturer.start_streaming(move |samples| sink.lock().push(samples.len())).unwrap();
        thread::sleep(Duration::from_millis(60));
        capturer.stop().unwrap();

        let spans = spans.lock();
        assert!(!spans.is_empty());
        assert!(spans.iter().all(|&len| len == 960));
    }

    #[test]
    fn transport_failure_fails_the_session() {
        let mut capturer = Capturer::new(mic().fail_transport_after(1));
        capturer.initialize(16).unwrap();

        let handle = capturer.start_recording().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while capturer.status() != StreamStatus::Failed && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(capturer.status(), StreamStatus::Failed);

        assert!(matches!(capturer.stop(), Err(StreamError::Transport(_))));
        assert!(matches!(handle.wait(), Err(StreamError::Transport(_))));
        assert!(matches!(capturer.last_error(), Some(StreamError::Transport(_))));
        assert_eq!(capturer.status(), StreamStatus::Idle);

        assert_eq!(capturer.start_recording().unwrap_err(), StreamError::NotInitialized);
        capturer.initialize(16).unwrap();
        assert!(capturer.last_error().is_none());
    }

    #[test]
    fn start_after_failure_requires_initialize() {
        let mut capturer = Capturer::new(mic().fail_transport_after(0));
        capturer.initialize(16).unwrap();

        let handle = capturer.start_recording().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while capturer.status() != StreamStatus::Failed && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(capturer.start_recording().unwrap_err(), StreamError::NotInitialized);
        assert_eq!(capturer.status(), StreamStatus::Idle);
        assert!(matches!(handle.wait(), Err(StreamError::Transport(_))));
    }

    #[test]
    fn reinitialize_while_running_stops_first() {
        let mut capturer = Capturer::new(mic());
        capturer.initialize(16).unwrap();
        let handle = capturer.start_recording().unwrap();

        capturer.initialize(32).unwrap();
        assert_eq!(capturer.status(), StreamStatus::Idle);
        assert!(handle.wait().is_ok());
        assert_eq!(capturer.session().unwrap().hardware_buffer_frames, 1536);
        assert_eq!(capturer.endpoint().probe().activations(), 2);
    }

    /// Hands out one region whose byte length ends mid-frame.
    struct ShortRegion {
        bytes: Vec<u8>,
        frames: u32,
        queued: bool,
    }

    impl CaptureTransport for ShortRegion {
        fn next_packet_frames(&mut self) -> Result<u32, StreamError> {
            Ok(if self.queued { self.frames } else { 0 })
        }

        fn read_packet(&mut self, read: &mut dyn FnMut(CapturePacket<'_>)) -> Result<u32, StreamError> {
            self.queued = false;
            read(CapturePacket {
                data: &self.bytes,
                frames: self.frames,
                silent: false,
            });
            Ok(self.frames)
        }
    }

    #[test]
    fn region_ending_mid_frame_is_truncated_to_whole_frames() {
        let format = AudioFormat::float_stereo(48000);
        let mut bytes = Vec::new();
        for sample in [0.1f32, 0.2, 0.3] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let mut transport: Box<dyn CaptureTransport> = Box::new(ShortRegion {
            bytes,
            frames: 2,
            queued: true,
        });

        let spans = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&spans);
        let mut worker = CaptureWorker {
            format,
            silent_packets: SilentPacketPolicy::Skip,
            scratch: Vec::new(),
            sink: StreamingSink(Box::new(move |samples: &[f32]| sink.lock().push(samples.to_vec()))),
        };
        worker.tick(&mut transport, &EngineCounters::default()).unwrap();

        let spans = spans.lock();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].len(), 2);
        assert_relative_eq!(spans[0][0], 0.1);
        assert_relative_eq!(spans[0][1], 0.2);
    }

    #[test]
    fn configured_buffer_duration_is_used() {
        let config = StreamConfiguration::from_json(r#"{ "buffer_duration_ms": 40 }"#).unwrap();
        let mut capturer = Capturer::with_config(mic(), config);
        capturer.initialize_from_config().unwrap();
        assert_eq!(capturer.session().unwrap().hardware_buffer_frames, 1920);

        capturer.initialize(16).unwrap();
        assert_eq!(capturer.session().unwrap().hardware_buffer_frames, 768);
    }

    #[test]
    fn packets_follow_the_device_period() {
        let endpoint = mic().with_period(Duration::from_millis(5));
        let mut capturer = Capturer::new(endpoint);
        capturer.initialize(2).unwrap();
        assert_eq!(capturer.session().unwrap().hardware_buffer_frames, 240);

        let spans = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&spans);
        capturer.start_streaming(move |samples| sink.lock().push(samples.len())).unwrap();
        thread::sleep(Duration::from_millis(40));
        capturer.stop().unwrap();

        let spans = spans.lock();
        assert!(!spans.is_empty());
        assert!(spans.iter().all(|&len| len == 480));
    }

    #[test]
    fn dropping_a_running_capturer_stops_it() {
        let endpoint = mic();
        let probe = endpoint.probe();
        let mut capturer = Capturer::new(endpoint.clone());
        capturer.initialize(16).unwrap();

        let handle = capturer.start_recording().unwrap();
        thread::sleep(Duration::from_millis(30));
        drop(capturer);

        assert!(handle.wait().is_ok());
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.stops(), 1);

        let mut next = Capturer::new(endpoint);
        next.initialize(16).unwrap();
        assert_eq!(probe.activations(), 2);
    }
}
