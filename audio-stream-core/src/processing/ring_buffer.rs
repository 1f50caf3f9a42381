/// What a full ring buffer does with new samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Reallocate to twice the capacity; nothing is lost.
    Grow,
    /// Drop the oldest samples to make room.
    DropOldest,
}

/// Circular FIFO of audio samples.
///
/// Single-threaded; wrap in `parking_lot::Mutex` (see `SampleBridge`) for
/// cross-thread access. Samples come out in exactly the order they went in.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    write_index: usize,
    read_index: usize,
    available: usize,
    policy: OverflowPolicy,
}

impl RingBuffer {
    /// Bounded buffer that drops the oldest samples on overflow.
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, OverflowPolicy::DropOldest)
    }

    /// Buffer that grows instead of dropping.
    pub fn growable(initial_capacity: usize) -> Self {
        Self::with_policy(initial_capacity, OverflowPolicy::Grow)
    }

    pub fn with_policy(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            policy,
        }
    }

    /// Write samples into the ring buffer.
    ///
    /// Returns how many previously queued or incoming samples were dropped,
    /// which is always 0 for a growable buffer.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        if samples.is_empty() {
            return 0;
        }

        match self.policy {
            OverflowPolicy::Grow => {
                let needed = self.available + samples.len();
                if needed > self.capacity() {
                    self.grow_to(needed);
                }
                self.copy_in(samples);
                0
            }
            OverflowPolicy::DropOldest => {
                let capacity = self.capacity();
                // More data than capacity: only the tail survives
                let (samples, skipped) = if samples.len() > capacity {
                    (&samples[samples.len() - capacity..], samples.len() - capacity)
                } else {
                    (samples, 0)
                };

                let overflow = (self.available + samples.len()).saturating_sub(capacity);
                if overflow > 0 {
                    self.read_index = (self.read_index + overflow) % capacity;
                    self.available -= overflow;
                }

                self.copy_in(samples);
                overflow + skipped
            }
        }
    }

    /// Remove and return the oldest sample.
    pub fn pop(&mut self) -> Option<f32> {
        if self.available == 0 {
            return None;
        }
        let sample = self.buffer[self.read_index];
        self.read_index = (self.read_index + 1) % self.capacity();
        self.available -= 1;
        Some(sample)
    }

    /// Read and remove up to `count` samples from the buffer.
    ///
    /// Returns fewer samples if fewer are available.
    pub fn read(&mut self, count: usize) -> Vec<f32> {
        let to_read = count.min(self.available);
        let mut result = vec![0.0; to_read];
        self.read_into(&mut result);
        result
    }

    /// Fill `out` from the front of the queue. Returns the number written.
    pub fn read_into(&mut self, out: &mut [f32]) -> usize {
        let to_read = out.len().min(self.available);
        let capacity = self.capacity();
        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = self.buffer[(self.read_index + i) % capacity];
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        to_read
    }

    /// Number of samples currently available for reading.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Reset the buffer to empty state. Capacity is kept.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    fn copy_in(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        for &sample in samples {
            self.buffer[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % capacity;
        }
        self.available += samples.len();
    }

    /// Linearize queued samples into a larger allocation.
    fn grow_to(&mut self, needed: usize) {
        let mut new_capacity = self.capacity() * 2;
        while new_capacity < needed {
            new_capacity *= 2;
        }
        let mut grown = vec![0.0; new_capacity];
        let queued = self.available;
        self.read_into(&mut grown[..queued]);
        self.buffer = grown;
        self.read_index = 0;
        self.write_index = queued;
        self.available = queued;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0]);

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn read_partial() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.count(), 2);

        let rest = buf.read(10); // request more than available
        assert_eq!(rest, vec![4.0, 5.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);
        let dropped = buf.write(&[5.0, 6.0]);

        assert_eq!(dropped, 2);
        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn write_larger_than_capacity() {
        let mut buf = RingBuffer::new(3);
        let dropped = buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(dropped, 2);
        assert_eq!(buf.read(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);

        buf.write(&[1.0, 2.0, 3.0]);
        buf.read(2); // read_index = 2

        buf.write(&[4.0, 5.0, 6.0]); // wraps around

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn growable_keeps_everything_in_order() {
        let mut buf = RingBuffer::growable(4);
        buf.write(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.pop(), Some(1.0));

        // wrapped contents must survive reallocation
        let dropped = buf.write(&[4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(dropped, 0);
        assert!(buf.capacity() >= 7);
        assert_eq!(buf.read(10), vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn pops_follow_push_order() {
        let mut buf = RingBuffer::growable(2);
        let pushed: Vec<f32> = (0..100).map(|i| i as f32 * 0.5).collect();
        for chunk in pushed.chunks(7) {
            buf.write(chunk);
        }

        let popped: Vec<f32> = (0..60).filter_map(|_| buf.pop()).collect();
        assert_eq!(popped, pushed[..60].to_vec());
        assert_eq!(buf.count(), 40);
    }

    #[test]
    fn reset_clears_buffer() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.reset();

        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
        assert!(buf.read(10).is_empty());
    }

    #[test]
    fn empty_operations() {
        let mut buf = RingBuffer::new(10);

        assert!(buf.is_empty());
        assert!(buf.read(5).is_empty());
        assert_eq!(buf.pop(), None);

        assert_eq!(buf.write(&[]), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.write(&[1.0, 2.0]);
        assert_eq!(buf.read(2), vec![2.0]);
    }
}
