//! `WAVEFORMATEX` ↔ `AudioFormat` conversion.

use windows::core::GUID;
use windows::Win32::Media::Audio::{WAVEFORMATEX, WAVEFORMATEXTENSIBLE, WAVEFORMATEXTENSIBLE_0, WAVE_FORMAT_PCM};
use windows::Win32::Media::KernelStreaming::{KSDATAFORMAT_SUBTYPE_PCM, WAVE_FORMAT_EXTENSIBLE};
use windows::Win32::Media::Multimedia::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_IEEE_FLOAT};

use audio_stream_core::models::format::{AudioFormat, SampleRepresentation};

const SPEAKER_FRONT_LEFT: u32 = 0x1;
const SPEAKER_FRONT_RIGHT: u32 = 0x2;
const SPEAKER_FRONT_CENTER: u32 = 0x4;

/// Read a format returned by WASAPI.
///
/// # Safety
/// `ptr` must point to a valid `WAVEFORMATEX`, followed by the
/// extensible tail when the tag says so.
pub(crate) unsafe fn from_wave_format(ptr: *const WAVEFORMATEX) -> Result<AudioFormat, String> {
    // Both structs are packed; copy out before touching fields.
    let base = std::ptr::read_unaligned(ptr);
    let tag = base.wFormatTag as u32;
    let channels = base.nChannels;
    let sample_rate = base.nSamplesPerSec;
    let bits = base.wBitsPerSample;

    let (is_float, valid_bits) = if tag == WAVE_FORMAT_EXTENSIBLE {
        let ext = std::ptr::read_unaligned(ptr as *const WAVEFORMATEXTENSIBLE);
        let sub_format = ext.SubFormat;
        let valid = ext.Samples.wValidBitsPerSample;
        if sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT {
            (true, valid)
        } else if sub_format == KSDATAFORMAT_SUBTYPE_PCM {
            (false, valid)
        } else {
            return Err(format!("unsupported sub-format {:?}", sub_format));
        }
    } else if tag == WAVE_FORMAT_IEEE_FLOAT {
        (true, bits)
    } else if tag == WAVE_FORMAT_PCM {
        (false, bits)
    } else {
        return Err(format!("unsupported format tag {:#x}", tag));
    };

    let representation = match (is_float, bits) {
        (true, 32) => SampleRepresentation::Float32,
        (false, 16) => SampleRepresentation::Int16,
        (false, 24) => SampleRepresentation::Int24,
        (false, 32) => SampleRepresentation::Int32,
        _ => {
            return Err(format!(
                "unsupported sample layout: {} bits ({} valid), float={}",
                bits, valid_bits, is_float
            ))
        }
    };

    let format = AudioFormat::new(channels, sample_rate, representation);
    format.validate()?;
    Ok(format)
}

fn channel_mask(channels: u16) -> u32 {
    match channels {
        1 => SPEAKER_FRONT_CENTER,
        2 => SPEAKER_FRONT_LEFT | SPEAKER_FRONT_RIGHT,
        _ => 0,
    }
}

/// Extensible descriptor for `format`, suitable for `Initialize` and
/// `IsFormatSupported`.
pub(crate) fn to_wave_format(format: &AudioFormat) -> WAVEFORMATEXTENSIBLE {
    let bits = format.representation.bits_per_sample();
    let block_align = format.block_align() as u16;
    let sub_format: GUID = match format.representation {
        SampleRepresentation::Float32 => KSDATAFORMAT_SUBTYPE_IEEE_FLOAT,
        _ => KSDATAFORMAT_SUBTYPE_PCM,
    };

    WAVEFORMATEXTENSIBLE {
        Format: WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_EXTENSIBLE as u16,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.sample_rate * block_align as u32,
            nBlockAlign: block_align,
            wBitsPerSample: bits,
            cbSize: (std::mem::size_of::<WAVEFORMATEXTENSIBLE>() - std::mem::size_of::<WAVEFORMATEX>()) as u16,
        },
        Samples: WAVEFORMATEXTENSIBLE_0 {
            wValidBitsPerSample: bits,
        },
        dwChannelMask: channel_mask(format.channels),
        SubFormat: sub_format,
    }
}
