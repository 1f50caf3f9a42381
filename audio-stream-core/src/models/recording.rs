use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::AudioFormat;

/// Result of one `start_recording` … `stop` cycle.
///
/// Samples are interleaved in the negotiated channel layout
/// `[c0, c1, …, c0, c1, …]`. Immutable once handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRecording {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub format: AudioFormat,
    pub duration_ms: u64,
    pub samples: Vec<f32>,
}

impl CapturedRecording {
    /// Builds a recording and derives its duration from the sample count.
    pub fn new(format: AudioFormat, started_at: DateTime<Utc>, samples: Vec<f32>) -> Self {
        let duration_ms = duration_ms_for(samples.len(), &format);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            format,
            duration_ms,
            samples,
        }
    }

    /// Whole frames held by the recording.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.format.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// De-interleaves one channel. Returns an empty vector for an
    /// out-of-range channel.
    pub fn channel(&self, index: u16) -> Vec<f32> {
        if index >= self.format.channels {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(index as usize)
            .step_by(self.format.channels as usize)
            .copied()
            .collect()
    }

    /// Averages all channels of each frame.
    pub fn to_mono(&self) -> Vec<f32> {
        downmix_to_mono(&self.samples, self.format.channels as usize)
    }
}

/// `floor(frames * 1000 / sample_rate)` where frames = samples / channels.
pub fn duration_ms_for(sample_count: usize, format: &AudioFormat) -> u64 {
    if format.sample_rate == 0 || format.channels == 0 {
        return 0;
    }
    let frames = (sample_count / format.channels as usize) as u64;
    frames * 1000 / format.sample_rate as u64
}

/// Downmix interleaved multichannel audio to mono by averaging channels.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;
    use approx::assert_relative_eq;

    fn stereo() -> AudioFormat {
        AudioFormat::new(2, 48000, SampleRepresentation::Float32)
    }

    #[test]
    fn duration_is_floor_of_frames_per_rate() {
        // 9600 stereo samples = 4800 frames = 100 ms
        let rec = CapturedRecording::new(stereo(), Utc::now(), vec![0.0; 9600]);
        assert_eq!(rec.duration_ms, 100);
        assert_eq!(rec.frames(), 4800);

        // 4799 frames rounds down to 99 ms
        let rec = CapturedRecording::new(stereo(), Utc::now(), vec![0.0; 9598]);
        assert_eq!(rec.duration_ms, 99);
    }

    #[test]
    fn empty_recording_has_zero_duration() {
        let rec = CapturedRecording::new(stereo(), Utc::now(), Vec::new());
        assert!(rec.is_empty());
        assert_eq!(rec.duration_ms, 0);
        assert_relative_eq!(rec.duration_secs(), 0.0);
    }

    #[test]
    fn channel_extracts_interleaved_lane() {
        let rec = CapturedRecording::new(stereo(), Utc::now(), vec![1.0, -1.0, 2.0, -2.0]);
        assert_eq!(rec.channel(0), vec![1.0, 2.0]);
        assert_eq!(rec.channel(1), vec![-1.0, -2.0]);
        assert!(rec.channel(2).is_empty());
    }

    #[test]
    fn to_mono_averages_frames() {
        let rec = CapturedRecording::new(stereo(), Utc::now(), vec![0.5, 0.1, 0.2, 0.4]);
        let mono = rec.to_mono();
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn recordings_get_distinct_ids() {
        let a = CapturedRecording::new(stereo(), Utc::now(), Vec::new());
        let b = CapturedRecording::new(stereo(), Utc::now(), Vec::new());
        assert_ne!(a.id, b.id);
    }
}
