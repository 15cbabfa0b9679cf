//! Describes a ScreenCaptureKit audio buffer list in core terms.
//!
//! ScreenCaptureKit hands over 32-bit float samples, usually one buffer per
//! channel. Only the sample rate comes from the format description; the
//! channel layout is read off the buffers themselves.

use sysrec_core::models::audio_models::{FormatDescriptor, SourceBuffer};

const BYTES_PER_SAMPLE: usize = 4;

/// Frames carried by the longest segment.
///
/// A segment shorter than this makes the batch malformed, and conversion
/// rejects it instead of cutting the other channels down.
pub fn frame_count(buffers: &[SourceBuffer<'_>]) -> usize {
    buffers
        .iter()
        .filter(|b| b.channels > 0)
        .map(|b| b.data.len() / (BYTES_PER_SAMPLE * b.channels as usize))
        .max()
        .unwrap_or(0)
}

/// Format descriptor for a batch, or `None` when the sample rate is unknown.
pub fn describe(sample_rate: Option<f64>, buffers: &[SourceBuffer<'_>]) -> Option<FormatDescriptor> {
    let sample_rate = sample_rate?;
    let channels: u32 = buffers.iter().map(|b| b.channels).sum();
    if buffers.len() == 1 && channels > 1 {
        Some(FormatDescriptor::float32_interleaved(sample_rate, channels))
    } else {
        Some(FormatDescriptor::float32_planar(sample_rate, channels))
    }
}

/// Seconds since stream start for a batch whose first frame is `frames_before`.
pub fn elapsed_secs(frames_before: u64, sample_rate: Option<f64>) -> f64 {
    match sample_rate {
        Some(rate) if rate > 0.0 => frames_before as f64 / rate,
        _ => 0.0,
    }
}
