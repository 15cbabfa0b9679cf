use std::path::PathBuf;

/// Options passed to the capture source when the stream is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Always requested; present so sources can assert on it.
    pub captures_audio: bool,

    /// Keep this process's own playback out of the recording (default: true).
    pub excludes_current_process_audio: bool,

    /// Preferred sample rate hint. The delivered format still wins.
    pub sample_rate: Option<u32>,

    /// Preferred channel count hint. The delivered format still wins.
    pub channel_count: Option<u16>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            captures_audio: true,
            excludes_current_process_audio: true,
            sample_rate: None,
            channel_count: None,
        }
    }
}

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Output WAV path (default: `output.wav`). Overwritten if present.
    pub output_path: PathBuf,

    /// Log one line per delivered batch.
    pub verbose: bool,

    /// Consecutive append failures tolerated before the session is torn down.
    pub max_consecutive_write_failures: u32,

    pub stream: StreamOptions,
}

impl CaptureConfiguration {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.output_path.as_os_str().is_empty() {
            return Err("output path must not be empty".into());
        }
        if self.output_path.file_name().is_none() {
            return Err(format!("output path has no file name: {}", self.output_path.display()));
        }
        if self.max_consecutive_write_failures == 0 {
            return Err("max consecutive write failures must be at least 1".into());
        }
        if !self.stream.captures_audio {
            return Err("audio capture must be enabled".into());
        }
        if self.stream.sample_rate == Some(0) {
            return Err("sample rate hint must be positive".into());
        }
        if self.stream.channel_count == Some(0) {
            return Err("channel count hint must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.wav"),
            verbose: false,
            max_consecutive_write_failures: 8,
            stream: StreamOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = CaptureConfiguration::default();
        assert_eq!(config.output_path, PathBuf::from("output.wav"));
        assert!(config.stream.excludes_current_process_audio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_path() {
        let config = CaptureConfiguration::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_failure_budget() {
        let config = CaptureConfiguration {
            max_consecutive_write_failures: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_hints() {
        let mut config = CaptureConfiguration::default();
        config.stream.channel_count = Some(0);
        assert!(config.validate().is_err());
    }
}
