//! # audio-stream-windows
//!
//! Windows WASAPI backend for audio-stream-core.
//!
//! Provides:
//! - `WasapiEndpoint` / `WasapiClient`: shared-mode `IAudioClient` behind the core `Endpoint` traits
//! - `EndpointLocator`: default and by-id endpoint lookup, endpoint listing
//! - `DeviceNotificationRegistration`: hot-plug events into a `DeviceNotificationListener`
//! - `VolumeNotificationRegistration`: endpoint volume changes into a `VolumeNotificationHub`
//!
//! ## Usage
//! ```ignore
//! use audio_stream_core::{Direction, Oscillator, Renderer, Waveform};
//! use audio_stream_windows::EndpointLocator;
//!
//! let locator = EndpointLocator::new()?;
//! let mut renderer = Renderer::new(locator.default_endpoint(Direction::Render)?);
//! renderer.initialize(16)?;
//! renderer.start(Oscillator::new(Waveform::Sine, 440.0).into_callback())?;
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod endpoint_locator;
#[cfg(target_os = "windows")]
pub mod notification_client;
#[cfg(target_os = "windows")]
pub mod volume_client;
#[cfg(target_os = "windows")]
pub mod wasapi_endpoint;
#[cfg(target_os = "windows")]
pub mod wasapi_transport;
#[cfg(target_os = "windows")]
mod wave_format;

#[cfg(target_os = "windows")]
pub use endpoint_locator::{EndpointInfo, EndpointLocator};
#[cfg(target_os = "windows")]
pub use notification_client::DeviceNotificationRegistration;
#[cfg(target_os = "windows")]
pub use volume_client::VolumeNotificationRegistration;
#[cfg(target_os = "windows")]
pub use wasapi_endpoint::{WasapiClient, WasapiEndpoint};
