//! WASAPI shared-mode endpoint and client.
//!
//! `WasapiEndpoint` wraps an `IMMDevice`; `activate` yields a `WasapiClient`
//! around a fresh `IAudioClient`. The client hands out capture or render
//! transports that the core engines drive from their polling threads.

use std::time::Duration;

use windows::Win32::Foundation::S_FALSE;
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, IAudioRenderClient, IMMDevice, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_NOPERSIST, WAVEFORMATEX,
};
use windows::Win32::System::Com::CLSCTX_ALL;

use audio_stream_core::models::error::{InitError, StreamError};
use audio_stream_core::models::format::{AudioFormat, BufferInfo, NegotiatedFormat};
use audio_stream_core::models::frame::Direction;
use audio_stream_core::traits::endpoint::{AudioClient, Endpoint};
use audio_stream_core::traits::transport::{CaptureTransport, RenderTransport};

use crate::com::{self, CoTaskMem};
use crate::wasapi_transport::{WasapiCaptureTransport, WasapiRenderTransport};
use crate::wave_format;

/// REFERENCE_TIME ticks (100 ns) per millisecond.
const HNS_PER_MS: i64 = 10_000;

/// A WASAPI audio endpoint.
pub struct WasapiEndpoint {
    device: IMMDevice,
    id: String,
    direction: Direction,
}

// SAFETY: The device is created in the multithreaded apartment and only
// used from MTA threads (`com::ensure_mta` runs before every call).
unsafe impl Send for WasapiEndpoint {}

impl WasapiEndpoint {
    pub(crate) fn new(device: IMMDevice, id: String, direction: Direction) -> Self {
        Self { device, id, direction }
    }

    pub fn device(&self) -> &IMMDevice {
        &self.device
    }
}

impl Endpoint for WasapiEndpoint {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn activate(&self) -> Result<Box<dyn AudioClient>, InitError> {
        com::ensure_mta().map_err(|e| InitError::ActivationFailed(format!("CoInitializeEx failed: {}", e)))?;
        let client: IAudioClient = unsafe { self.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| InitError::ActivationFailed(format!("Activate failed on {}: {}", self.id, e)))?;
        Ok(Box::new(WasapiClient {
            client,
            direction: self.direction,
            format: None,
        }))
    }
}

/// An `IAudioClient` in shared mode.
pub struct WasapiClient {
    client: IAudioClient,
    direction: Direction,
    /// Format the client was initialized with.
    format: Option<AudioFormat>,
}

// SAFETY: See `WasapiEndpoint`.
unsafe impl Send for WasapiClient {}

impl WasapiClient {
    fn initialized_format(&self) -> Result<AudioFormat, InitError> {
        self.format
            .ok_or_else(|| InitError::ServiceUnavailable("client is not initialized".into()))
    }
}

fn stream_error(op: &'static str) -> impl Fn(windows::core::Error) -> StreamError {
    move |e| StreamError::Transport(format!("{} failed: {}", op, e))
}

impl AudioClient for WasapiClient {
    fn mix_format(&mut self) -> Result<AudioFormat, InitError> {
        let mix = unsafe { self.client.GetMixFormat() }
            .map(CoTaskMem)
            .map_err(|e| InitError::FormatUnsupported(format!("GetMixFormat failed: {}", e)))?;
        unsafe { wave_format::from_wave_format(mix.as_ptr()) }.map_err(InitError::FormatUnsupported)
    }

    fn negotiate(&mut self, desired: &AudioFormat) -> Result<NegotiatedFormat, InitError> {
        let requested = wave_format::to_wave_format(desired);
        let mut closest: *mut WAVEFORMATEX = std::ptr::null_mut();
        let hr = unsafe {
            self.client.IsFormatSupported(
                AUDCLNT_SHAREMODE_SHARED,
                &requested as *const _ as *const WAVEFORMATEX,
                Some(&mut closest as *mut _),
            )
        };
        let closest = CoTaskMem(closest);

        if hr == S_FALSE && !closest.0.is_null() {
            let actual = unsafe { wave_format::from_wave_format(closest.as_ptr()) }
                .map_err(InitError::FormatUnsupported)?;
            return Ok(NegotiatedFormat::Substituted {
                requested: *desired,
                actual,
            });
        }
        hr.ok()
            .map_err(|e| InitError::FormatUnsupported(format!("{}: {}", desired, e)))?;
        Ok(NegotiatedFormat::Accepted(*desired))
    }

    fn initialize(&mut self, format: &AudioFormat, buffer_duration: Duration) -> Result<BufferInfo, InitError> {
        let wave = wave_format::to_wave_format(format);
        let hns = buffer_duration.as_millis() as i64 * HNS_PER_MS;

        unsafe {
            self.client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                hns,
                0,
                &wave as *const _ as *const WAVEFORMATEX,
                None,
            )
        }
        .map_err(|e| InitError::FormatUnsupported(format!("IAudioClient::Initialize failed: {}", e)))?;

        let buffer_frames = unsafe { self.client.GetBufferSize() }
            .map_err(|e| InitError::ActivationFailed(format!("GetBufferSize failed: {}", e)))?;
        let latency_hns = unsafe { self.client.GetStreamLatency() }
            .map_err(|e| InitError::ActivationFailed(format!("GetStreamLatency failed: {}", e)))?;

        self.format = Some(*format);
        Ok(BufferInfo {
            buffer_frames,
            latency: Duration::from_nanos(latency_hns.max(0) as u64 * 100),
        })
    }

    fn capture_transport(&mut self) -> Result<Box<dyn CaptureTransport>, InitError> {
        let format = self.initialized_format()?;
        if self.direction != Direction::Capture {
            return Err(InitError::ServiceUnavailable("not a capture endpoint".into()));
        }
        let capture: IAudioCaptureClient = unsafe { self.client.GetService() }
            .map_err(|e| InitError::ServiceUnavailable(format!("IAudioCaptureClient: {}", e)))?;
        Ok(Box::new(WasapiCaptureTransport::new(capture, format)))
    }

    fn render_transport(&mut self) -> Result<Box<dyn RenderTransport>, InitError> {
        let format = self.initialized_format()?;
        if self.direction != Direction::Render {
            return Err(InitError::ServiceUnavailable("not a render endpoint".into()));
        }
        let render: IAudioRenderClient = unsafe { self.client.GetService() }
            .map_err(|e| InitError::ServiceUnavailable(format!("IAudioRenderClient: {}", e)))?;
        let buffer_frames = unsafe { self.client.GetBufferSize() }
            .map_err(|e| InitError::ServiceUnavailable(format!("GetBufferSize failed: {}", e)))?;
        Ok(Box::new(WasapiRenderTransport::new(
            self.client.clone(),
            render,
            buffer_frames,
            format,
        )))
    }

    fn start(&mut self) -> Result<(), StreamError> {
        unsafe { self.client.Start() }.map_err(stream_error("IAudioClient::Start"))
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        unsafe { self.client.Stop() }.map_err(stream_error("IAudioClient::Stop"))
    }

    fn reset(&mut self) -> Result<(), StreamError> {
        unsafe { self.client.Reset() }.map_err(stream_error("IAudioClient::Reset"))
    }
}
