//! Capture and render transports over WASAPI service interfaces.
//!
//! Used only from an engine's polling thread; the first call on that
//! thread joins the MTA and registers it with MMCSS.

use windows::Win32::Media::Audio::{IAudioCaptureClient, IAudioClient, IAudioRenderClient, AUDCLNT_BUFFERFLAGS_SILENT};

use audio_stream_core::models::error::StreamError;
use audio_stream_core::models::format::AudioFormat;
use audio_stream_core::traits::transport::{CapturePacket, CaptureTransport, RenderFlags, RenderTransport};

use std::cell::RefCell;

use windows::core::w;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use crate::com;

/// MMCSS "Pro Audio" registration of the current thread, reverted on drop.
struct MmcssTask(HANDLE);

impl Drop for MmcssTask {
    fn drop(&mut self) {
        if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(self.0) } {
            log::debug!("failed to revert MMCSS registration: {}", e);
        }
    }
}

thread_local! {
    static MMCSS: RefCell<Option<MmcssTask>> = const { RefCell::new(None) };
}

/// Raise the calling thread to real-time audio priority once. Failure only
/// costs scheduling priority, so it is logged and ignored.
fn register_pro_audio() {
    MMCSS.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return;
        }
        let mut task_index: u32 = 0;
        match unsafe { AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) } {
            Ok(handle) => *slot = Some(MmcssTask(handle)),
            Err(e) => log::warn!("MMCSS registration failed: {}", e),
        }
    });
}

fn transport_error(op: &'static str) -> impl Fn(windows::core::Error) -> StreamError {
    move |e| StreamError::Transport(format!("{} failed: {}", op, e))
}

/// Per-call thread setup for the polling thread.
fn join_mta() -> Result<(), StreamError> {
    com::ensure_mta().map_err(transport_error("CoInitializeEx"))?;
    register_pro_audio();
    Ok(())
}

pub struct WasapiCaptureTransport {
    capture: IAudioCaptureClient,
    block_align: usize,
}

// SAFETY: Created in the MTA and moved to the polling thread, which joins
// the MTA before touching it. Never used from two threads at once.
unsafe impl Send for WasapiCaptureTransport {}

impl WasapiCaptureTransport {
    pub(crate) fn new(capture: IAudioCaptureClient, format: AudioFormat) -> Self {
        Self {
            capture,
            block_align: format.block_align(),
        }
    }
}

impl CaptureTransport for WasapiCaptureTransport {
    fn next_packet_frames(&mut self) -> Result<u32, StreamError> {
        join_mta()?;
        unsafe { self.capture.GetNextPacketSize() }.map_err(transport_error("GetNextPacketSize"))
    }

    fn read_packet(&mut self, read: &mut dyn FnMut(CapturePacket<'_>)) -> Result<u32, StreamError> {
        join_mta()?;
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut frames: u32 = 0;
        let mut flags: u32 = 0;

        unsafe {
            self.capture
                .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
                .map_err(transport_error("GetBuffer"))?;
        }

        if frames > 0 && !data.is_null() {
            // SAFETY: WASAPI guarantees `frames * block_align` readable bytes
            // until ReleaseBuffer.
            let bytes = unsafe { std::slice::from_raw_parts(data, frames as usize * self.block_align) };
            read(CapturePacket {
                data: bytes,
                frames,
                silent: flags & AUDCLNT_BUFFERFLAGS_SILENT.0 as u32 != 0,
            });
        }

        unsafe { self.capture.ReleaseBuffer(frames) }.map_err(transport_error("ReleaseBuffer"))?;
        Ok(frames)
    }
}

pub struct WasapiRenderTransport {
    client: IAudioClient,
    render: IAudioRenderClient,
    buffer_frames: u32,
    block_align: usize,
}

// SAFETY: See `WasapiCaptureTransport`.
unsafe impl Send for WasapiRenderTransport {}

impl WasapiRenderTransport {
    pub(crate) fn new(client: IAudioClient, render: IAudioRenderClient, buffer_frames: u32, format: AudioFormat) -> Self {
        Self {
            client,
            render,
            buffer_frames,
            block_align: format.block_align(),
        }
    }
}

impl RenderTransport for WasapiRenderTransport {
    fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    fn current_padding(&mut self) -> Result<u32, StreamError> {
        join_mta()?;
        unsafe { self.client.GetCurrentPadding() }.map_err(transport_error("GetCurrentPadding"))
    }

    fn write_frames(
        &mut self,
        frames: u32,
        fill: &mut dyn FnMut(&mut [u8]) -> RenderFlags,
    ) -> Result<(), StreamError> {
        join_mta()?;
        let data = unsafe { self.render.GetBuffer(frames) }.map_err(transport_error("GetBuffer"))?;

        let flags = if data.is_null() {
            RenderFlags::Silent
        } else {
            // SAFETY: GetBuffer succeeded for `frames` frames; the region is
            // writable until ReleaseBuffer.
            let region = unsafe { std::slice::from_raw_parts_mut(data, frames as usize * self.block_align) };
            fill(region)
        };

        let release_flags = match flags {
            RenderFlags::Data => 0,
            RenderFlags::Silent => AUDCLNT_BUFFERFLAGS_SILENT.0 as u32,
        };
        unsafe { self.render.ReleaseBuffer(frames, release_flags) }.map_err(transport_error("ReleaseBuffer"))
    }
}
