use std::f64::consts::PI;

use crate::models::frame::FrameInfo;

/// Basic periodic waveforms for render callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Frequency of the note `semitones` above `base` in twelve-tone equal temperament.
pub fn note_frequency(base: f64, semitones: i32) -> f64 {
    base * 2f64.powf(semitones as f64 / 12.0)
}

/// Fractional position inside the current cycle, in `[0, 1)`.
fn period_progression(time: f64, frequency: f64) -> f64 {
    let cycles = time * frequency;
    cycles - cycles.floor()
}

/// Stateless oscillator evaluated at a frame's elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    pub amplitude: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            frequency,
            amplitude: 1.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn sample_at(&self, time: f64) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.frequency * time).sin(),
            _ if self.frequency == 0.0 => 0.0,
            Waveform::Square => {
                if period_progression(time, self.frequency) <= 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => period_progression(time, self.frequency) * 2.0 - 1.0,
            Waveform::Triangle => {
                let p = period_progression(time, self.frequency);
                if p <= 0.25 {
                    p / 0.25
                } else if p <= 0.75 {
                    2.0 - p * 4.0
                } else {
                    p / 0.25 - 4.0
                }
            }
        };
        value as f32 * self.amplitude
    }

    pub fn sample(&self, frame: FrameInfo) -> f32 {
        self.sample_at(frame.elapsed_secs)
    }

    /// Boxed render callback producing this oscillator's signal.
    pub fn into_callback(self) -> Box<dyn FnMut(FrameInfo) -> f32 + Send + 'static> {
        Box::new(move |frame| self.sample(frame))
    }
}
