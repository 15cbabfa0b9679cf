use thiserror::Error;

/// Errors that can occur while recording a capture session.
///
/// Setup errors (`Enumeration`, `UnsupportedPlatform`, `Configuration`, `Storage`)
/// are returned synchronously from `start`. Steady-state errors (`Conversion`, `Write`)
/// only drop the affected batch. The remaining variants, and `Storage` raised
/// while streaming, end the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no capture target available: {0}")]
    Enumeration(String),

    #[error("audio capture unsupported on this platform: {0}")]
    UnsupportedPlatform(String),

    #[error("audio format unavailable: {0}")]
    FormatUnavailable(String),

    #[error("buffer conversion failed: {0}")]
    Conversion(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("giving up after {0} consecutive write failures")]
    WriteFailuresExceeded(u32),

    #[error("capture stream failed: {0}")]
    StreamFatal(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CaptureError {
    /// Whether this error tears down the whole session rather than a single batch.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::FormatUnavailable(_) | Self::WriteFailuresExceeded(_) | Self::StreamFatal(_) | Self::Storage(_)
        )
    }
}
