use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use super::format::AudioFormat;

/// Engine lifecycle.
///
/// State transitions:
/// ```text
/// idle → running → stopping → idle
///           ↓
///         failed → (stop / start reaps the session) → idle, uninitialized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    Idle,
    Running,
    Stopping,
    Failed,
}

impl StreamStatus {
    fn to_raw(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Failed => 3,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Status cell read by the polling thread every tick and written by the
/// controlling thread.
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub fn new(status: StreamStatus) -> Self {
        Self(AtomicU8::new(status.to_raw()))
    }

    pub fn load(&self) -> StreamStatus {
        StreamStatus::from_raw(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, status: StreamStatus) {
        self.0.store(status.to_raw(), Ordering::SeqCst);
    }

    /// Moves from `current` to `new`. Returns false if another thread moved
    /// the status first.
    pub fn transition(&self, current: StreamStatus, new: StreamStatus) -> bool {
        self.0
            .compare_exchange(current.to_raw(), new.to_raw(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new(StreamStatus::Idle)
    }
}

/// Snapshot of an initialized engine's runtime parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSession {
    pub status: StreamStatus,
    pub format: AudioFormat,
    pub poll_interval: Duration,
    pub hardware_buffer_frames: u32,
    pub latency: Duration,
}

/// Per-engine counters, updated from the polling thread.
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub ticks: AtomicU64,
    pub frames: AtomicU64,
    pub silent_packets: AtomicU64,
}

impl EngineCounters {
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            silent_packets: self.silent_packets.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.frames.store(0, Ordering::Relaxed);
        self.silent_packets.store(0, Ordering::Relaxed);
    }
}

/// Diagnostics for a stream engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Completed poll-loop iterations.
    pub ticks: u64,
    /// Frames moved between application memory and hardware.
    pub frames: u64,
    /// Capture packets flagged silent by the hardware.
    pub silent_packets: u64,
}
