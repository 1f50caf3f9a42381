//! # audio-stream-core
//!
//! Platform-agnostic real-time capture and render engines.
//!
//! Each engine owns one polling thread that moves samples between a
//! hardware transport and application memory. Platform backends (Windows
//! WASAPI) implement the `Endpoint`/`AudioClient` traits; `VirtualEndpoint`
//! provides a clock-driven software device for tests and headless hosts.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/          ← Endpoint, AudioClient, CaptureTransport, RenderTransport, DeviceNotificationListener
//! ├── models/          ← AudioFormat, StreamError, StreamStatus, StreamConfiguration, DeviceEvent, etc.
//! ├── engine/          ← Capturer, Renderer, Monitor, RecordingHandle, shared StreamEngine
//! ├── processing/      ← sample codec, RingBuffer, SampleBridge, Oscillator
//! ├── notifications/   ← NotificationHub, VolumeNotificationHub
//! └── virtual_device/  ← VirtualEndpoint, VirtualProbe
//! ```

pub mod engine;
pub mod models;
pub mod notifications;
pub mod processing;
pub mod traits;
pub mod virtual_device;

// Re-export key types at crate root for convenience.
pub use engine::capturer::{Capturer, SampleSpanCallback};
pub use engine::handle::RecordingHandle;
pub use engine::monitor::Monitor;
pub use engine::renderer::{FrameCallback, Renderer};
pub use models::config::{SilentPacketPolicy, StreamConfiguration};
pub use models::device_event::{DeviceEvent, VolumeInfo};
pub use models::error::{InitError, StreamError};
pub use models::format::{AudioFormat, BufferInfo, NegotiatedFormat, SampleRepresentation};
pub use models::frame::{Direction, FrameInfo};
pub use models::recording::CapturedRecording;
pub use models::state::{EngineStats, StreamSession, StreamStatus};
pub use notifications::hub::NotificationHub;
pub use notifications::subscription::{SubscriptionGuard, SubscriptionId};
pub use notifications::volume::VolumeNotificationHub;
pub use processing::bridge::{BridgeStats, SampleBridge};
pub use processing::ring_buffer::{OverflowPolicy, RingBuffer};
pub use processing::synth::{Oscillator, Waveform};
pub use traits::device_listener::DeviceNotificationListener;
pub use traits::endpoint::{AudioClient, Endpoint};
pub use traits::transport::{CapturePacket, CaptureTransport, RenderFlags, RenderTransport};
pub use virtual_device::{VirtualEndpoint, VirtualProbe};
