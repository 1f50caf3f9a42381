use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::config::StreamConfiguration;
use crate::models::error::{InitError, StreamError};
use crate::models::format::{AudioFormat, NegotiatedFormat};
use crate::models::state::{AtomicStatus, EngineCounters, EngineStats, StreamSession, StreamStatus};
use crate::traits::endpoint::{AudioClient, Endpoint, OpenTransport};

/// One tick's worth of work, run on the engine's polling thread.
pub(crate) trait PollWorker<T>: Send + 'static {
    /// Move data between application memory and the hardware transport.
    fn tick(&mut self, transport: &mut T, counters: &EngineCounters) -> Result<(), StreamError>;

    /// Called once on the polling thread after the loop exits.
    fn finish(self, outcome: &Result<(), StreamError>);
}

/// Parameters fixed by `initialize`.
#[derive(Debug, Clone, Copy)]
struct SessionParams {
    format: AudioFormat,
    poll_interval: Duration,
    buffer_frames: u32,
    latency: Duration,
}

/// What the polling thread hands back when it exits.
struct WorkerExit<T> {
    transport: T,
    outcome: Result<(), StreamError>,
}

/// Shared capture/render core.
///
/// Owns an endpoint-derived client and, while running, one polling thread
/// that sleeps for half the hardware latency between ticks. The transport
/// moves onto the polling thread on `start` and comes back on `stop`, so it
/// is only ever touched by one thread at a time.
///
/// ```text
/// initialize ─→ idle ─start─→ running ─stop─→ stopping ─join─→ idle
///                               │ transport failure
///                               ↓
///                             failed ─stop/start─→ idle (uninitialized)
/// ```
pub struct StreamEngine<E: Endpoint, T: OpenTransport> {
    endpoint: E,
    config: StreamConfiguration,
    client: Option<Box<dyn AudioClient>>,
    transport: Option<T>,
    params: Option<SessionParams>,
    status: Arc<AtomicStatus>,
    counters: Arc<EngineCounters>,
    worker: Option<thread::JoinHandle<WorkerExit<T>>>,
    last_error: Option<StreamError>,
}

impl<E: Endpoint, T: OpenTransport> StreamEngine<E, T> {
    pub fn new(endpoint: E, config: StreamConfiguration) -> Self {
        Self {
            endpoint,
            config,
            client: None,
            transport: None,
            params: None,
            status: Arc::new(AtomicStatus::default()),
            counters: Arc::new(EngineCounters::default()),
            worker: None,
            last_error: None,
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn config(&self) -> &StreamConfiguration {
        &self.config
    }

    pub fn status(&self) -> StreamStatus {
        self.status.load()
    }

    pub fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    /// Negotiated format, once initialized.
    pub fn format(&self) -> Option<AudioFormat> {
        self.params.map(|p| p.format)
    }

    pub fn session(&self) -> Option<StreamSession> {
        self.params.map(|p| StreamSession {
            status: self.status.load(),
            format: p.format,
            poll_interval: p.poll_interval,
            hardware_buffer_frames: p.buffer_frames,
            latency: p.latency,
        })
    }

    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// The failure that terminated the most recent session, if any.
    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    /// Open the endpoint, negotiate a format and size the hardware buffer.
    ///
    /// Re-initializing a running engine stops it first.
    pub fn initialize(&mut self, buffer_duration_ms: u32) -> Result<(), InitError> {
        let config = self.config.clone().with_buffer_duration_ms(buffer_duration_ms);
        config.validate()?;

        if !self.status.load().is_idle() {
            log::warn!("re-initializing a {} engine that is not idle; stopping it first", T::DIRECTION);
            if let Err(e) = self.stop() {
                log::warn!("previous session ended with: {}", e);
            }
        }
        self.release();

        let mut client = self.endpoint.activate()?;

        let desired = match config.desired_format {
            Some(format) => format,
            None => client.mix_format()?,
        };
        let negotiated = client.negotiate(&desired)?;
        if let NegotiatedFormat::Substituted { requested, actual } = negotiated {
            log::warn!("format {} not supported by {}, using {}", requested, self.endpoint.id(), actual);
        }
        let format = negotiated.format();
        format.validate().map_err(InitError::FormatUnsupported)?;

        let info = client.initialize(&format, Duration::from_millis(buffer_duration_ms as u64))?;
        let transport = T::open(client.as_mut())?;

        let poll_interval = poll_interval_for(&format, info.buffer_frames, info.latency, &config);

        log::debug!(
            "{} engine on {}: {}, buffer {} frames, latency {:?}, poll every {:?}",
            T::DIRECTION,
            self.endpoint.id(),
            format,
            info.buffer_frames,
            info.latency,
            poll_interval
        );

        self.config = config;
        self.client = Some(client);
        self.transport = Some(transport);
        self.params = Some(SessionParams {
            format,
            poll_interval,
            buffer_frames: info.buffer_frames,
            latency: info.latency,
        });
        self.last_error = None;
        self.counters.reset();
        self.status.store(StreamStatus::Idle);
        Ok(())
    }

    /// `initialize` with the buffer duration from the configuration.
    pub fn initialize_from_config(&mut self) -> Result<(), InitError> {
        self.initialize(self.config.buffer_duration_ms)
    }

    /// Start the hardware stream and spawn the polling thread.
    ///
    /// `prime` runs on the calling thread with the transport before the
    /// hardware stream starts. `make_worker` builds the per-tick worker once
    /// the start is committed. Returns `Ok(false)` without side effects when
    /// the engine is already running.
    pub(crate) fn launch<W, P, M>(&mut self, prime: P, make_worker: M) -> Result<bool, StreamError>
    where
        W: PollWorker<T>,
        P: FnOnce(&mut T, &AudioFormat) -> Result<(), StreamError>,
        M: FnOnce(&AudioFormat) -> W,
    {
        self.reap_failed()?;

        if !self.status.load().is_idle() {
            log::warn!("{} engine already running; start ignored", T::DIRECTION);
            return Ok(false);
        }

        let params = self.params.ok_or(StreamError::NotInitialized)?;
        let Some(client) = self.client.as_mut() else {
            return Err(StreamError::NotInitialized);
        };
        let Some(mut transport) = self.transport.take() else {
            return Err(StreamError::NotInitialized);
        };

        let started = prime(&mut transport, &params.format).and_then(|()| client.start());
        if let Err(e) = started {
            self.transport = Some(transport);
            return Err(e);
        }

        self.counters.reset();
        self.status.store(StreamStatus::Running);

        let worker = make_worker(&params.format);
        let status = Arc::clone(&self.status);
        let counters = Arc::clone(&self.counters);
        let interval = params.poll_interval;

        let spawned = thread::Builder::new()
            .name(format!("audio-{}-engine", T::DIRECTION))
            .spawn(move || {
                let mut transport = transport;
                let outcome = poll_loop(worker, &mut transport, &status, &counters, interval);
                WorkerExit { transport, outcome }
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                log::info!("{} engine started on {}", T::DIRECTION, self.endpoint.id());
                Ok(true)
            }
            Err(e) => {
                // The transport moved into the failed closure; the session is gone.
                self.status.store(StreamStatus::Idle);
                self.stop_client();
                self.release();
                Err(StreamError::ThreadSpawn(e.to_string()))
            }
        }
    }

    /// Signal the polling thread, join it, and stop the hardware stream.
    ///
    /// No-op while idle. Returns the transport failure that terminated the
    /// loop, if there was one; the engine must then be re-initialized.
    pub fn stop(&mut self) -> Result<(), StreamError> {
        match self.status.load() {
            StreamStatus::Idle => return Ok(()),
            StreamStatus::Running => {
                self.status.transition(StreamStatus::Running, StreamStatus::Stopping);
            }
            StreamStatus::Stopping | StreamStatus::Failed => {}
        }

        let outcome = self.join_worker();
        self.stop_client();
        self.status.store(StreamStatus::Idle);

        match outcome {
            Ok(()) => {
                log::info!("{} engine stopped", T::DIRECTION);
                Ok(())
            }
            Err(e) => {
                log::error!("{} engine terminated: {}", T::DIRECTION, e);
                self.release();
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Client access for operations only valid while idle.
    pub(crate) fn idle_client(&mut self) -> Result<&mut dyn AudioClient, StreamError> {
        self.reap_failed()?;
        if !self.status.load().is_idle() {
            return Err(StreamError::InvalidState(format!(
                "{} engine must be idle",
                T::DIRECTION
            )));
        }
        match self.client.as_mut() {
            Some(client) => Ok(client.as_mut()),
            None => Err(StreamError::NotInitialized),
        }
    }

    /// A session that failed mid-tick is torn down before anything else
    /// happens, so the next start never resumes it.
    fn reap_failed(&mut self) -> Result<(), StreamError> {
        if self.status.load() == StreamStatus::Failed {
            if let Err(e) = self.stop() {
                log::warn!("discarded failed {} session: {}", T::DIRECTION, e);
            }
            return Err(StreamError::NotInitialized);
        }
        Ok(())
    }

    fn join_worker(&mut self) -> Result<(), StreamError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(exit) => {
                self.transport = Some(exit.transport);
                exit.outcome
            }
            Err(_) => Err(StreamError::Transport(format!(
                "{} engine thread panicked",
                T::DIRECTION
            ))),
        }
    }

    fn stop_client(&mut self) {
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.stop() {
                log::warn!("failed to stop {} stream: {}", T::DIRECTION, e);
            }
        }
    }

    /// Drop the client, transport and session parameters.
    fn release(&mut self) {
        self.transport = None;
        self.client = None;
        self.params = None;
    }
}

impl<E: Endpoint, T: OpenTransport> Drop for StreamEngine<E, T> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{} engine dropped after failure: {}", T::DIRECTION, e);
        }
        self.release();
    }
}

/// Half the hardware latency, floored by configuration. Endpoints that
/// report no latency fall back to half the buffer duration.
fn poll_interval_for(
    format: &AudioFormat,
    buffer_frames: u32,
    latency: Duration,
    config: &StreamConfiguration,
) -> Duration {
    let reference = if latency.is_zero() {
        format.frames_to_duration(buffer_frames as u64)
    } else {
        latency
    };
    let floor = Duration::from_micros(config.min_poll_interval_us);
    (reference / 2).max(floor)
}

fn poll_loop<T, W: PollWorker<T>>(
    mut worker: W,
    transport: &mut T,
    status: &AtomicStatus,
    counters: &EngineCounters,
    interval: Duration,
) -> Result<(), StreamError> {
    let outcome = loop {
        if status.load() != StreamStatus::Running {
            break Ok(());
        }
        thread::sleep(interval);

        if let Err(e) = worker.tick(transport, counters) {
            status.store(StreamStatus::Failed);
            break Err(e);
        }
        counters.ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    };
    worker.finish(&outcome);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;
    use approx::assert_relative_eq;

    #[test]
    fn poll_interval_is_half_latency() {
        let format = AudioFormat::new(2, 48000, SampleRepresentation::Float32);
        let config = StreamConfiguration::default();
        let interval = poll_interval_for(&format, 768, Duration::from_millis(16), &config);
        assert_eq!(interval, Duration::from_millis(8));
    }

    #[test]
    fn poll_interval_falls_back_to_buffer_duration() {
        let format = AudioFormat::new(2, 48000, SampleRepresentation::Float32);
        let config = StreamConfiguration::default();
        let interval = poll_interval_for(&format, 960, Duration::ZERO, &config);
        assert_relative_eq!(interval.as_secs_f64(), 0.010, epsilon = 1e-6);
    }

    #[test]
    fn poll_interval_respects_floor() {
        let format = AudioFormat::new(2, 48000, SampleRepresentation::Float32);
        let config = StreamConfiguration {
            min_poll_interval_us: 5000,
            ..Default::default()
        };
        let interval = poll_interval_for(&format, 96, Duration::from_millis(2), &config);
        assert_eq!(interval, Duration::from_millis(5));
    }
}
