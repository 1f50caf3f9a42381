use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a single sample is laid out in a hardware buffer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRepresentation {
    Float32,
    Int16,
    Int24,
    Int32,
}

impl SampleRepresentation {
    /// Width of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Float32 | Self::Int32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }
}

/// Negotiated stream format.
///
/// Immutable once a stream is initialized; shared read-only with callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub representation: SampleRepresentation,
}

impl AudioFormat {
    pub fn new(channels: u16, sample_rate: u32, representation: SampleRepresentation) -> Self {
        Self {
            channels,
            sample_rate,
            representation,
        }
    }

    /// Shared-mode default: 32-bit float stereo at 48 kHz.
    pub fn float_stereo(sample_rate: u32) -> Self {
        Self::new(2, sample_rate, SampleRepresentation::Float32)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.channels == 0 {
            return Err("channel count must be at least 1".into());
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        Ok(())
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.representation.bytes_per_sample()
    }

    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    pub fn duration_to_frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as u64
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}ch {}Hz {:?}",
            self.channels, self.sample_rate, self.representation
        )
    }
}

/// Outcome of format negotiation against an endpoint.
///
/// Negotiation either accepts the requested format or substitutes the closest
/// format the endpoint can run. Outright failure is an `InitError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatedFormat {
    Accepted(AudioFormat),
    Substituted {
        requested: AudioFormat,
        actual: AudioFormat,
    },
}

impl NegotiatedFormat {
    /// The format the stream will actually run with.
    pub fn format(&self) -> AudioFormat {
        match self {
            Self::Accepted(format) => *format,
            Self::Substituted { actual, .. } => *actual,
        }
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Self::Substituted { .. })
    }
}

/// Hardware buffer geometry reported after client initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub buffer_frames: u32,
    pub latency: Duration,
}
