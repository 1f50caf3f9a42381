use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::ring_buffer::{OverflowPolicy, RingBuffer};

const DEFAULT_INITIAL_CAPACITY: usize = 48_000;

/// Underrun/overrun bookkeeping for a bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub pushed: u64,
    pub popped: u64,
    /// Pops that found the queue empty and produced silence.
    pub underruns: u64,
    /// Samples discarded by a bounded bridge to make room.
    pub overrun_drops: u64,
    /// Largest queue depth observed after a push.
    pub peak_depth: usize,
}

#[derive(Debug, Default)]
struct BridgeCounters {
    pushed: AtomicU64,
    popped: AtomicU64,
    underruns: AtomicU64,
    overrun_drops: AtomicU64,
    peak_depth: AtomicUsize,
}

/// Capture → render sample queue shared between two engine threads.
///
/// The capture thread pushes, the render thread pops one sample per frame.
/// Both sides take the same lock for the duration of a single push or pop,
/// so neither observes a half-written queue. Popping an empty bridge yields
/// silence instead of blocking.
#[derive(Debug, Clone)]
pub struct SampleBridge {
    buffer: Arc<Mutex<RingBuffer>>,
    counters: Arc<BridgeCounters>,
}

impl SampleBridge {
    /// Bridge that grows as needed.
    pub fn new() -> Self {
        Self::from_buffer(RingBuffer::growable(DEFAULT_INITIAL_CAPACITY))
    }

    /// Bridge holding at most `capacity` samples, dropping the oldest.
    pub fn bounded(capacity: usize) -> Self {
        Self::from_buffer(RingBuffer::new(capacity))
    }

    /// Growable when `capacity` is None, bounded otherwise.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::new(),
        }
    }

    fn from_buffer(buffer: RingBuffer) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(buffer)),
            counters: Arc::new(BridgeCounters::default()),
        }
    }

    /// Producer side: append a captured span.
    pub fn push(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let (dropped, depth) = {
            let mut buffer = self.buffer.lock();
            let dropped = buffer.write(samples);
            (dropped, buffer.count())
        };
        self.counters.pushed.fetch_add(samples.len() as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.counters.overrun_drops.fetch_add(dropped as u64, Ordering::Relaxed);
        }
        self.counters.peak_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Consumer side: next sample, or 0.0 when the queue is empty.
    pub fn pop(&self) -> f32 {
        match self.buffer.lock().pop() {
            Some(sample) => {
                self.counters.popped.fetch_add(1, Ordering::Relaxed);
                sample
            }
            None => {
                self.counters.underruns.fetch_add(1, Ordering::Relaxed);
                0.0
            }
        }
    }

    /// Fill `out` from the queue, padding the tail with silence.
    /// Returns how many real samples were copied.
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let copied = self.buffer.lock().read_into(out);
        out[copied..].fill(0.0);
        self.counters.popped.fetch_add(copied as u64, Ordering::Relaxed);
        if copied < out.len() {
            self.counters.underruns.fetch_add((out.len() - copied) as u64, Ordering::Relaxed);
        }
        copied
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.buffer.lock().policy()
    }

    /// Drop everything queued. Counters are kept.
    pub fn clear(&self) {
        self.buffer.lock().reset();
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            popped: self.counters.popped.load(Ordering::Relaxed),
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            overrun_drops: self.counters.overrun_drops.load(Ordering::Relaxed),
            peak_depth: self.counters.peak_depth.load(Ordering::Relaxed),
        }
    }
}

impl Default for SampleBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pops_return_pushed_prefix_in_order() {
        let bridge = SampleBridge::new();
        let pushed: Vec<f32> = (0..500).map(|i| i as f32).collect();
        for chunk in pushed.chunks(33) {
            bridge.push(chunk);
        }

        let popped: Vec<f32> = (0..320).map(|_| bridge.pop()).collect();
        assert_eq!(popped, pushed[..320].to_vec());
        assert_eq!(bridge.len(), 180);
    }

    #[test]
    fn empty_pop_is_silence_and_counts_underrun() {
        let bridge = SampleBridge::new();
        assert_eq!(bridge.pop(), 0.0);
        assert_eq!(bridge.pop(), 0.0);
        assert_eq!(bridge.stats().underruns, 2);
        assert_eq!(bridge.stats().popped, 0);
    }

    #[test]
    fn pop_into_pads_with_silence() {
        let bridge = SampleBridge::new();
        bridge.push(&[0.1, 0.2]);
        let mut out = [9.0f32; 4];
        assert_eq!(bridge.pop_into(&mut out), 2);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0]);
        assert_eq!(bridge.stats().underruns, 2);
    }

    #[test]
    fn bounded_bridge_reports_overrun() {
        let bridge = SampleBridge::bounded(4);
        bridge.push(&[1.0, 2.0, 3.0]);
        bridge.push(&[4.0, 5.0, 6.0]);

        let stats = bridge.stats();
        assert_eq!(stats.overrun_drops, 2);
        assert_eq!(stats.pushed, 6);
        assert_eq!(stats.peak_depth, 4);
        assert_eq!(bridge.pop(), 3.0);
    }

    #[test]
    fn clear_keeps_counters() {
        let bridge = SampleBridge::new();
        bridge.push(&[1.0, 2.0]);
        bridge.clear();
        assert!(bridge.is_empty());
        assert_eq!(bridge.stats().pushed, 2);
    }

    #[test]
    fn concurrent_producer_and_consumer_preserve_order() {
        let bridge = SampleBridge::new();
        let producer = bridge.clone();

        let handle = thread::spawn(move || {
            for block in 0..200 {
                let span: Vec<f32> = (0..10).map(|i| (block * 10 + i) as f32).collect();
                producer.push(&span);
            }
        });

        let mut received = Vec::with_capacity(2000);
        while received.len() < 2000 {
            if !bridge.is_empty() {
                received.push(bridge.pop());
            } else {
                thread::yield_now();
            }
        }
        handle.join().unwrap();

        let expected: Vec<f32> = (0..2000).map(|i| i as f32).collect();
        assert_eq!(received, expected);
    }
}
