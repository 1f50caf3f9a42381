pub mod bridge;
pub mod ring_buffer;
pub mod sample_codec;
pub mod synth;
