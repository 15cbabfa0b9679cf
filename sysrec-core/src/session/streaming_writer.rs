use std::path::{Path, PathBuf};

use crate::models::audio_models::{DeliveredBatch, NegotiatedFormat};
use crate::models::error::CaptureError;
use crate::processing::{converter, negotiator};
use crate::storage::wav_writer::{self, WavFileWriter};

/// Format and container, created together on the first successful write.
struct NegotiatedSession {
    format: NegotiatedFormat,
    container: WavFileWriter,
}

enum WriterState {
    /// Output location prepared; no format known yet.
    Pending,
    Open(NegotiatedSession),
    Finalized,
}

/// What a successful [`StreamingWriter::write`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteOutcome {
    /// First batch: format negotiated, container created, batch appended.
    Negotiated { format: NegotiatedFormat, frames: usize },
    Appended { frames: usize },
}

impl WriteOutcome {
    pub fn frames(&self) -> usize {
        match self {
            Self::Negotiated { frames, .. } | Self::Appended { frames } => *frames,
        }
    }
}

/// A closed container.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedContainer {
    pub file_path: PathBuf,
    pub format: NegotiatedFormat,
    pub frames_written: u64,
    pub checksum: String,
}

/// Owns the output container for one session.
///
/// Negotiates the format from the first batch, then converts and appends
/// every batch in call order. Not internally synchronized; the session keeps
/// it behind a mutex so appends never overlap.
pub struct StreamingWriter {
    output_path: PathBuf,
    state: WriterState,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl StreamingWriter {
    /// Prepare `output_path` (creating parent directories) without touching the file.
    pub fn open(output_path: PathBuf, max_consecutive_failures: u32) -> Result<Self, CaptureError> {
        wav_writer::ensure_parent_dir(&output_path)?;
        Ok(Self {
            output_path,
            state: WriterState::Pending,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
        })
    }

    /// Convert and append one batch, negotiating first if this is the first one.
    ///
    /// `FormatUnavailable`, `Storage` and `WriteFailuresExceeded` mean the
    /// session cannot continue; other errors only cost this batch.
    pub fn write(&mut self, batch: &DeliveredBatch<'_>) -> Result<WriteOutcome, CaptureError> {
        match &mut self.state {
            WriterState::Finalized => Err(CaptureError::Write("container already finalized".into())),
            WriterState::Pending => {
                let format = negotiator::negotiate(batch)?;
                let converted = converter::convert(batch, &format)?;
                let mut container = WavFileWriter::create(self.output_path.clone(), format)?;
                container.append(&converted).map_err(|e| CaptureError::Storage(e.to_string()))?;

                log::info!("Created audio file with format: {}", format);
                self.state = WriterState::Open(NegotiatedSession { format, container });
                Ok(WriteOutcome::Negotiated {
                    format,
                    frames: converted.frame_count(),
                })
            }
            WriterState::Open(session) => {
                negotiator::check_consistent(&session.format, batch.descriptor.as_ref())?;
                let converted = converter::convert(batch, &session.format)?;
                match session.container.append(&converted) {
                    Ok(()) => {
                        self.consecutive_failures = 0;
                        Ok(WriteOutcome::Appended {
                            frames: converted.frame_count(),
                        })
                    }
                    Err(e) => {
                        self.consecutive_failures += 1;
                        if self.consecutive_failures >= self.max_consecutive_failures {
                            log::error!("Last write error before giving up: {}", e);
                            Err(CaptureError::WriteFailuresExceeded(self.consecutive_failures))
                        } else {
                            Err(e)
                        }
                    }
                }
            }
        }
    }

    /// Close the container, if one was created. Later writes are refused.
    ///
    /// Returns `Ok(None)` when no batch was ever written.
    pub fn finalize(&mut self) -> Result<Option<FinalizedContainer>, CaptureError> {
        match std::mem::replace(&mut self.state, WriterState::Finalized) {
            WriterState::Pending | WriterState::Finalized => Ok(None),
            WriterState::Open(mut session) => {
                let checksum = session.container.close()?;
                log::info!("Audio file saved to: {}", self.output_path.display());
                Ok(Some(FinalizedContainer {
                    file_path: self.output_path.clone(),
                    format: session.format,
                    frames_written: session.container.frames_written(),
                    checksum,
                }))
            }
        }
    }

    /// Negotiated format, once the first batch has been written.
    pub fn format(&self) -> Option<&NegotiatedFormat> {
        match &self.state {
            WriterState::Open(session) => Some(&session.format),
            _ => None,
        }
    }

    pub fn frames_written(&self) -> u64 {
        match &self.state {
            WriterState::Open(session) => session.container.frames_written(),
            _ => 0,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, WriterState::Finalized)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[cfg(test)]
    pub(crate) fn fail_next_appends(&mut self, count: u32) {
        if let WriterState::Open(session) = &mut self.state {
            session.container.fail_next_appends(count);
        }
    }
}
