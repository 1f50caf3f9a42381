use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
struct ProbeState {
    activations: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    resets: AtomicU64,
    silent_frames: AtomicU64,
    rendered: Mutex<Vec<f32>>,
}

/// Observation point into a `VirtualEndpoint`, shared with every client
/// the endpoint activates.
#[derive(Clone, Default)]
pub struct VirtualProbe {
    state: Arc<ProbeState>,
}

impl VirtualProbe {
    pub fn activations(&self) -> u64 {
        self.state.activations.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> u64 {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> u64 {
        self.state.resets.load(Ordering::SeqCst)
    }

    /// Frames written with the silent flag.
    pub fn silent_frames(&self) -> u64 {
        self.state.silent_frames.load(Ordering::SeqCst)
    }

    /// Interleaved samples handed to the render device so far. Regions
    /// released as silent appear as zeros.
    pub fn rendered_samples(&self) -> Vec<f32> {
        self.state.rendered.lock().clone()
    }

    /// Number of interleaved samples rendered so far.
    pub fn rendered_len(&self) -> usize {
        self.state.rendered.lock().len()
    }

    pub(crate) fn record_activation(&self) {
        self.state.activations.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_start(&self) {
        self.state.starts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_stop(&self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_reset(&self) {
        self.state.resets.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rendered(&self, samples: &[f32], silent_frames: u64) {
        self.state.silent_frames.fetch_add(silent_frames, Ordering::SeqCst);
        self.state.rendered.lock().extend_from_slice(samples);
    }
}
