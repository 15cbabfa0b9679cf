use serde::{Deserialize, Serialize};

/// Sample layout as reported by the capture source for one batch.
///
/// Only the first batch's descriptor is authoritative; it becomes the
/// session's [`NegotiatedFormat`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatDescriptor {
    pub sample_rate: f64,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
    pub is_float: bool,
    pub is_non_interleaved: bool,
}

impl FormatDescriptor {
    /// 32-bit float, non-interleaved: what ScreenCaptureKit delivers.
    pub fn float32_planar(sample_rate: f64, channels: u32) -> Self {
        Self {
            sample_rate,
            channels_per_frame: channels,
            bits_per_channel: 32,
            is_float: true,
            is_non_interleaved: true,
        }
    }

    pub fn float32_interleaved(sample_rate: f64, channels: u32) -> Self {
        Self {
            is_non_interleaved: false,
            ..Self::float32_planar(sample_rate, channels)
        }
    }
}

/// One segment of a delivered batch's buffer list.
///
/// `channels` is the number of interleaved channels carried by `data`:
/// 1 for each segment of a planar batch, N for a single interleaved segment.
#[derive(Debug, Clone, Copy)]
pub struct SourceBuffer<'a> {
    pub channels: u32,
    pub data: &'a [u8],
}

/// A timestamped batch of audio handed over by the capture source.
///
/// The byte buffers are borrowed from the source and are only valid for the
/// duration of the delivery callback.
#[derive(Debug, Clone)]
pub struct DeliveredBatch<'a> {
    pub presentation_time_secs: f64,
    pub frame_count: usize,
    pub buffers: Vec<SourceBuffer<'a>>,
    pub descriptor: Option<FormatDescriptor>,
}

impl DeliveredBatch<'_> {
    /// Total channels carried across all buffer segments.
    pub fn channel_count(&self) -> u32 {
        self.buffers.iter().map(|b| b.channels).sum()
    }
}

/// In-memory sample representation handed to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRepresentation {
    Float32Planar,
}

/// Output format fixed by the first batch of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub sample_rate: f64,
    pub channels: u16,
    pub representation: SampleRepresentation,
}

impl NegotiatedFormat {
    pub fn float32_planar(sample_rate: f64, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            representation: SampleRepresentation::Float32Planar,
        }
    }
}

impl std::fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz, {} ch, 32-bit float, non-interleaved", self.sample_rate, self.channels)
    }
}

/// Planar f32 samples for one batch, channel order matching the negotiated format.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedBuffer {
    frame_count: usize,
    channels: Vec<Vec<f32>>,
}

impl ConvertedBuffer {
    /// Builds a buffer from per-channel sample vectors.
    ///
    /// Returns `None` if the channels differ in length.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Option<Self> {
        let frame_count = channels.first().map(Vec::len).unwrap_or(0);
        if channels.iter().any(|c| c.len() != frame_count) {
            return None;
        }
        Some(Self { frame_count, channels })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// Which kind of output a stream handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Audio,
    Screen,
}

/// Counters for one capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Batches handed to the session while it was accepting audio.
    pub batches_received: u64,
    pub batches_written: u64,
    pub batches_dropped: u64,
    pub frames_written: u64,
    /// Batches that arrived after teardown began and were discarded.
    pub late_batches: u64,
}
