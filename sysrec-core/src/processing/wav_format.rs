//! WAV file format utilities for 32-bit IEEE float recordings.
//!
//! Non-PCM WAV needs the 18-byte `fmt ` chunk and a `fact` chunk, so the
//! header is 58 bytes rather than the classic 44.

use crate::models::audio_models::ConvertedBuffer;

/// Size of the float WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 58;

/// `WAVE_FORMAT_IEEE_FLOAT`.
pub const FORMAT_IEEE_FLOAT: u16 = 3;

pub const BITS_PER_SAMPLE: u16 = 32;

const RIFF_SIZE_OFFSET: usize = 4;
const FACT_FRAMES_OFFSET: usize = 46;
const DATA_SIZE_OFFSET: usize = 54;

/// Generate a 58-byte float WAV header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  18 (fmt chunk size)
/// [20-21]  3 (IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * 4
/// [32-33]  block_align = channels * 4
/// [34-35]  32
/// [36-37]  0 (cbSize)
/// [38-41]  "fact"
/// [42-45]  4
/// [46-49]  frames per channel
/// [50-53]  "data"
/// [54-57]  data_size
/// ```
///
/// Returns `None` when the block alignment or byte rate does not fit its field.
pub fn generate_wav_header(sample_rate: u32, channels: u16, frames: u32) -> Option<[u8; WAV_HEADER_SIZE]> {
    let (block_align, byte_rate) = frame_geometry(sample_rate, channels)?;
    let data_size = frames.saturating_mul(u32::from(block_align));
    let riff_size = (WAV_HEADER_SIZE as u32 - 8).saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&18u32.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_IEEE_FLOAT.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..38].copy_from_slice(&0u16.to_le_bytes());

    header[38..42].copy_from_slice(b"fact");
    header[42..46].copy_from_slice(&4u32.to_le_bytes());
    header[46..50].copy_from_slice(&frames.to_le_bytes());

    header[50..54].copy_from_slice(b"data");
    header[54..58].copy_from_slice(&data_size.to_le_bytes());

    Some(header)
}

/// Sample rate as stored in the header, rounded to whole hertz.
pub fn header_sample_rate(sample_rate: f64) -> Option<u32> {
    let rounded = sample_rate.round();
    (rounded >= 1.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

/// `(block_align, byte_rate)` for float samples, checked against the
/// 16- and 32-bit header fields.
pub fn frame_geometry(sample_rate: u32, channels: u16) -> Option<(u16, u32)> {
    let block_align = channels.checked_mul(BITS_PER_SAMPLE / 8)?;
    let byte_rate = sample_rate.checked_mul(u32::from(block_align))?;
    Some((block_align, byte_rate))
}

/// Byte offsets and values to patch once the final frame count is known.
///
/// Sizes saturate at `u32::MAX`; RIFF cannot describe more.
pub fn size_patches(frames: u64, channels: u16) -> [(usize, u32); 3] {
    let block_align = u64::from(channels) * u64::from(BITS_PER_SAMPLE / 8);
    let data_size = frames.saturating_mul(block_align);
    let riff_size = data_size.saturating_add(WAV_HEADER_SIZE as u64 - 8);
    [
        (RIFF_SIZE_OFFSET, clamp_u32(riff_size)),
        (FACT_FRAMES_OFFSET, clamp_u32(frames)),
        (DATA_SIZE_OFFSET, clamp_u32(data_size)),
    ]
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Interleave a planar buffer into little-endian f32 bytes for the `data` chunk.
pub fn interleave_le_bytes(buffer: &ConvertedBuffer) -> Vec<u8> {
    let channels = buffer.channels();
    let mut data = Vec::with_capacity(buffer.frame_count() * channels.len() * 4);
    for frame in 0..buffer.frame_count() {
        for channel in channels {
            data.extend_from_slice(&channel[frame].to_le_bytes());
        }
    }
    data
}

/// Fields read back from a float WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeaderInfo {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
    pub data_size: u32,
}

/// Parse a header produced by [`generate_wav_header`].
pub fn parse_wav_header(bytes: &[u8]) -> Option<WavHeaderInfo> {
    if bytes.len() < WAV_HEADER_SIZE
        || &bytes[0..4] != b"RIFF"
        || &bytes[8..12] != b"WAVE"
        || &bytes[12..16] != b"fmt "
        || &bytes[38..42] != b"fact"
        || &bytes[50..54] != b"data"
    {
        return None;
    }
    let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    Some(WavHeaderInfo {
        format_tag: u16_at(20),
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bits_per_sample: u16_at(34),
        frames: u32_at(FACT_FRAMES_OFFSET),
        data_size: u32_at(DATA_SIZE_OFFSET),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_chunk_ids() {
        let header = generate_wav_header(48000, 2, 0).unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[38..42], b"fact");
        assert_eq!(&header[50..54], b"data");
    }

    #[test]
    fn header_48khz_stereo_float() {
        let header = generate_wav_header(48000, 2, 4800).unwrap();

        assert_eq!(u16::from_le_bytes([header[20], header[21]]), FORMAT_IEEE_FLOAT);
        assert_eq!(u32::from_le_bytes([header[16], header[17], header[18], header[19]]), 18);

        let byte_rate = u32::from_le_bytes([header[28], header[29], header[30], header[31]]);
        assert_eq!(byte_rate, 384000); // 48000 * 2 * 4

        let block_align = u16::from_le_bytes([header[32], header[33]]);
        assert_eq!(block_align, 8);

        let info = parse_wav_header(&header).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.bits_per_sample, 32);
        assert_eq!(info.frames, 4800);
        assert_eq!(info.data_size, 4800 * 8);

        let riff_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        assert_eq!(riff_size, 50 + 4800 * 8);
    }

    #[test]
    fn patches_match_generated_header() {
        let mut header = generate_wav_header(44100, 1, 0).unwrap();
        for (offset, value) in size_patches(1000, 1) {
            header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        assert_eq!(header, generate_wav_header(44100, 1, 1000).unwrap());
    }

    #[test]
    fn oversized_geometry_has_no_header() {
        assert_eq!(frame_geometry(48000, 2), Some((8, 384000)));
        assert_eq!(frame_geometry(48000, 16384), None);
        assert_eq!(frame_geometry(2_000_000_000, 2), None);
        assert!(generate_wav_header(48000, 16384, 0).is_none());
        assert!(generate_wav_header(2_000_000_000, 2, 0).is_none());
    }

    #[test]
    fn header_rate_rounds_to_whole_hertz() {
        assert_eq!(header_sample_rate(44100.4), Some(44100));
        assert_eq!(header_sample_rate(0.4), None);
        assert_eq!(header_sample_rate(5.0e9), None);
        assert_eq!(header_sample_rate(f64::NAN), None);
    }

    #[test]
    fn patches_saturate() {
        let patches = size_patches(u64::MAX / 2, 8);
        assert!(patches.iter().all(|(_, value)| *value == u32::MAX));
    }

    #[test]
    fn interleaves_planar_channels() {
        let buffer = ConvertedBuffer::from_channels(vec![vec![1.0, 3.0], vec![2.0, 4.0]]).unwrap();
        let bytes = interleave_le_bytes(&buffer);
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(samples, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_foreign_header() {
        assert!(parse_wav_header(&[0u8; 10]).is_none());
        assert!(parse_wav_header(&[0u8; WAV_HEADER_SIZE]).is_none());
    }
}
