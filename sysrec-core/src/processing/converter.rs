//! Conversion of delivered buffer lists into planar f32 buffers.
//!
//! A delivered batch is a list of byte segments. Each segment carries one or
//! more interleaved channels; the planar layout ScreenCaptureKit uses is one
//! single-channel segment per channel. Channels are numbered in segment order.

use crate::models::audio_models::{ConvertedBuffer, DeliveredBatch, NegotiatedFormat, SourceBuffer};
use crate::models::error::CaptureError;

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<f32>();

/// Copy `batch.frame_count` frames of every negotiated channel into a planar buffer.
///
/// Samples are copied bit-for-bit. Non-float or non-32-bit sources are
/// rejected rather than reinterpreted.
pub fn convert(batch: &DeliveredBatch<'_>, format: &NegotiatedFormat) -> Result<ConvertedBuffer, CaptureError> {
    if let Some(descriptor) = &batch.descriptor {
        if !descriptor.is_float || descriptor.bits_per_channel != 32 {
            return Err(CaptureError::Conversion(format!(
                "unsupported sample layout: {}-bit {}",
                descriptor.bits_per_channel,
                if descriptor.is_float { "float" } else { "integer" }
            )));
        }
    }

    let wanted = usize::from(format.channels);
    let available = batch.channel_count() as usize;
    if available < wanted {
        return Err(CaptureError::Conversion(format!(
            "batch carries {available} channels, format needs {wanted}"
        )));
    }

    let frames = batch.frame_count;
    let mut channels = Vec::with_capacity(wanted);
    for (segment, offset) in channel_map(&batch.buffers).take(wanted) {
        channels.push(copy_channel(segment, offset, frames)?);
    }

    ConvertedBuffer::from_channels(channels)
        .ok_or_else(|| CaptureError::Conversion("channel lengths diverged".into()))
}

/// Yields `(segment, channel offset within segment)` in channel order.
fn channel_map<'s, 'a>(buffers: &'s [SourceBuffer<'a>]) -> impl Iterator<Item = (&'s SourceBuffer<'a>, usize)> {
    buffers
        .iter()
        .flat_map(|segment| (0..segment.channels as usize).map(move |offset| (segment, offset)))
}

fn copy_channel(segment: &SourceBuffer<'_>, offset: usize, frames: usize) -> Result<Vec<f32>, CaptureError> {
    let stride = segment.channels as usize * BYTES_PER_SAMPLE;
    let needed = frames
        .checked_mul(stride)
        .ok_or_else(|| CaptureError::Conversion(format!("frame count {frames} overflows")))?;
    if segment.data.len() < needed {
        return Err(CaptureError::Conversion(format!(
            "segment holds {} bytes, {frames} frames need {needed}",
            segment.data.len()
        )));
    }

    let mut samples = Vec::new();
    samples
        .try_reserve_exact(frames)
        .map_err(|e| CaptureError::Conversion(format!("cannot allocate {frames} frames: {e}")))?;

    let start = offset * BYTES_PER_SAMPLE;
    samples.extend(
        segment.data[..needed]
            .chunks_exact(stride)
            .map(|frame| f32::from_ne_bytes([frame[start], frame[start + 1], frame[start + 2], frame[start + 3]])),
    );
    Ok(samples)
}
