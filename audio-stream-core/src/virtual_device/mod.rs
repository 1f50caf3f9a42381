//! Software endpoints driven by the wall clock.
//!
//! Behave like shared-mode hardware: capture packets appear at the device
//! period, render buffers drain at the sample rate. Faults can be injected
//! at activation, negotiation, service lookup and mid-stream.

pub mod endpoint;
pub mod probe;

pub use endpoint::{SignalFn, VirtualEndpoint};
pub use probe::VirtualProbe;
