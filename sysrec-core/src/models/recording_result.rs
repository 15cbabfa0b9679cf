use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::{NegotiatedFormat, SessionStats};

/// Result returned when a capture session finalizes its container.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub format: NegotiatedFormat,
    pub frames_written: u64,
    pub duration_secs: f64,
    pub stats: SessionStats,
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata stored alongside a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_path: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub sample_rate: f64,
    pub channels: u16,
    pub frames_written: u64,
    pub checksum: String,
}

impl RecordingMetadata {
    pub fn new(file_path: &str, format: &NegotiatedFormat, frames_written: u64, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: file_path.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_secs: duration_secs(frames_written, format.sample_rate),
            sample_rate: format.sample_rate,
            channels: format.channels,
            frames_written,
            checksum: checksum.to_string(),
        }
    }
}

/// Playback length of `frames` at `sample_rate`.
pub fn duration_secs(frames: u64, sample_rate: f64) -> f64 {
    if sample_rate > 0.0 {
        frames as f64 / sample_rate
    } else {
        0.0
    }
}
