use std::time::Duration;

use crate::models::error::{InitError, StreamError};
use crate::models::format::{AudioFormat, BufferInfo, NegotiatedFormat};
use crate::models::frame::Direction;

use super::transport::{CaptureTransport, RenderTransport};

/// Opaque handle to a physical or virtual audio device.
///
/// Implemented by:
/// - `VirtualEndpoint` (software clock, tests and headless hosts)
/// - `WasapiEndpoint` (Windows)
pub trait Endpoint: Send + 'static {
    /// Stable device identifier.
    fn id(&self) -> String;

    fn direction(&self) -> Direction;

    /// Open a fresh client on this endpoint.
    fn activate(&self) -> Result<Box<dyn AudioClient>, InitError>;
}

/// A client bound to one endpoint, before and after stream initialization.
///
/// Lives on the controlling thread; the transports it hands out move to the
/// engine's polling thread.
pub trait AudioClient: Send {
    /// The endpoint's native shared-mode format.
    fn mix_format(&mut self) -> Result<AudioFormat, InitError>;

    /// Ask whether `desired` can run, or which format should run instead.
    fn negotiate(&mut self, desired: &AudioFormat) -> Result<NegotiatedFormat, InitError>;

    /// Bind the client to `format` with a hardware buffer of roughly
    /// `buffer_duration`. Returns the actual buffer geometry.
    fn initialize(&mut self, format: &AudioFormat, buffer_duration: Duration) -> Result<BufferInfo, InitError>;

    fn capture_transport(&mut self) -> Result<Box<dyn CaptureTransport>, InitError>;

    fn render_transport(&mut self) -> Result<Box<dyn RenderTransport>, InitError>;

    /// Start the hardware stream.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Stop the hardware stream. Stopping a stopped stream is not an error.
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Discard buffered data and the stream position. Only valid while stopped.
    fn reset(&mut self) -> Result<(), StreamError>;
}

/// Transport flavour an engine drives, obtained from an initialized client.
pub trait OpenTransport: Send + Sized + 'static {
    const DIRECTION: Direction;

    fn open(client: &mut dyn AudioClient) -> Result<Self, InitError>;
}

impl OpenTransport for Box<dyn CaptureTransport> {
    const DIRECTION: Direction = Direction::Capture;

    fn open(client: &mut dyn AudioClient) -> Result<Self, InitError> {
        client.capture_transport()
    }
}

impl OpenTransport for Box<dyn RenderTransport> {
    const DIRECTION: Direction = Direction::Render;

    fn open(client: &mut dyn AudioClient) -> Result<Self, InitError> {
        client.render_transport()
    }
}
