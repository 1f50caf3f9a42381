//! Conversion between raw hardware regions and `f32` samples.
//!
//! All representations are little-endian. Integer formats are scaled into
//! `[-1.0, 1.0)`; encoding clamps out-of-range values.

use crate::models::format::SampleRepresentation;

const INT16_SCALE: f32 = 32768.0;
const INT24_SCALE: f32 = 8_388_608.0;
const INT32_SCALE: f64 = 2_147_483_648.0;

/// Decode every whole sample in `bytes` and append it to `out`.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_into(bytes: &[u8], representation: SampleRepresentation, out: &mut Vec<f32>) {
    let width = representation.bytes_per_sample();
    out.reserve(bytes.len() / width);
    for chunk in bytes.chunks_exact(width) {
        out.push(decode_sample(chunk, representation));
    }
}

/// Decode one sample from a slice of exactly `bytes_per_sample` bytes.
pub fn decode_sample(bytes: &[u8], representation: SampleRepresentation) -> f32 {
    match representation {
        SampleRepresentation::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleRepresentation::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / INT16_SCALE,
        SampleRepresentation::Int24 => {
            // sign-extend the 24-bit value through the top byte of an i32
            let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            value as f32 / INT24_SCALE
        }
        SampleRepresentation::Int32 => {
            (i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / INT32_SCALE) as f32
        }
    }
}

/// Encode one sample into `dst`, which must hold `bytes_per_sample` bytes.
pub fn encode_sample(sample: f32, representation: SampleRepresentation, dst: &mut [u8]) {
    match representation {
        SampleRepresentation::Float32 => dst[..4].copy_from_slice(&sample.to_le_bytes()),
        SampleRepresentation::Int16 => {
            let clamped = sample.clamp(-1.0, 1.0);
            let value = (clamped * INT16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            dst[..2].copy_from_slice(&value.to_le_bytes());
        }
        SampleRepresentation::Int24 => {
            let clamped = sample.clamp(-1.0, 1.0);
            let value = (clamped * INT24_SCALE).clamp(-8_388_608.0, 8_388_607.0) as i32;
            dst[..3].copy_from_slice(&value.to_le_bytes()[..3]);
        }
        SampleRepresentation::Int32 => {
            let clamped = sample.clamp(-1.0, 1.0) as f64;
            let value = (clamped * INT32_SCALE).clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            dst[..4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Write `sample` into every channel slot of one frame.
pub fn encode_frame(sample: f32, representation: SampleRepresentation, frame: &mut [u8]) {
    let width = representation.bytes_per_sample();
    for slot in frame.chunks_exact_mut(width) {
        encode_sample(sample, representation, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn float32_is_passed_through() {
        let mut bytes = Vec::new();
        for s in [0.25f32, -0.5, 1.5] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let mut out = Vec::new();
        decode_into(&bytes, SampleRepresentation::Float32, &mut out);
        assert_eq!(out, vec![0.25, -0.5, 1.5]);
    }

    #[test]
    fn int16_scaling_and_clamping() {
        let mut dst = [0u8; 2];
        encode_sample(2.0, SampleRepresentation::Int16, &mut dst);
        assert_eq!(i16::from_le_bytes(dst), i16::MAX);

        encode_sample(-1.0, SampleRepresentation::Int16, &mut dst);
        assert_eq!(i16::from_le_bytes(dst), i16::MIN);
        assert_relative_eq!(decode_sample(&dst, SampleRepresentation::Int16), -1.0);

        encode_sample(0.5, SampleRepresentation::Int16, &mut dst);
        assert_relative_eq!(decode_sample(&dst, SampleRepresentation::Int16), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn int24_sign_extends() {
        let mut dst = [0u8; 3];
        encode_sample(-0.25, SampleRepresentation::Int24, &mut dst);
        assert_relative_eq!(decode_sample(&dst, SampleRepresentation::Int24), -0.25, epsilon = 1e-6);

        encode_sample(1.0, SampleRepresentation::Int24, &mut dst);
        assert_eq!(dst, [0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn int32_scaling() {
        let mut dst = [0u8; 4];
        encode_sample(0.75, SampleRepresentation::Int32, &mut dst);
        assert_relative_eq!(decode_sample(&dst, SampleRepresentation::Int32), 0.75, epsilon = 1e-6);
    }

    #[test]
    fn partial_trailing_sample_is_ignored() {
        let mut out = Vec::new();
        decode_into(&[0, 0, 0, 0, 1, 2], SampleRepresentation::Float32, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn frame_broadcasts_to_all_channels() {
        let mut frame = [0u8; 6];
        encode_frame(0.5, SampleRepresentation::Int16, &mut frame);
        let mut out = Vec::new();
        decode_into(&frame, SampleRepresentation::Int16, &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-4));
    }
}
