use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::{ConvertedBuffer, NegotiatedFormat};
use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Append-only float WAV container.
///
/// ## File Format
///
/// ```text
/// [58-byte float WAV header, sizes patched on close]
/// [interleaved little-endian f32 frames...]
/// ```
///
/// Each append is all-or-nothing: a failed write is truncated back to the
/// last complete batch so the frame count in the header stays truthful.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: NegotiatedFormat,
    file: Option<File>,
    frames_written: u64,
    committed_bytes: u64,
    /// Appends left to cut short with a disk-full error.
    #[cfg(test)]
    injected_failures: u32,
}

impl WavFileWriter {
    /// Create (or truncate) the file at `file_path` and write a placeholder header.
    pub fn create(file_path: PathBuf, format: NegotiatedFormat) -> Result<Self, CaptureError> {
        let header = wav_format::header_sample_rate(format.sample_rate)
            .and_then(|rate| wav_format::generate_wav_header(rate, format.channels, 0))
            .ok_or_else(|| CaptureError::FormatUnavailable(format!("{} does not fit a WAV header", format)))?;

        let mut file = File::create(&file_path)
            .map_err(|e| CaptureError::Storage(format!("failed to create {}: {}", file_path.display(), e)))?;

        file.write_all(&header)
            .map_err(|e| CaptureError::Storage(format!("failed to write header: {}", e)))?;

        Ok(Self {
            file_path,
            format,
            file: Some(file),
            frames_written: 0,
            committed_bytes: wav_format::WAV_HEADER_SIZE as u64,
            #[cfg(test)]
            injected_failures: 0,
        })
    }

    /// Append one converted batch.
    pub fn append(&mut self, buffer: &ConvertedBuffer) -> Result<(), CaptureError> {
        if buffer.channel_count() != usize::from(self.format.channels) {
            return Err(CaptureError::Write(format!(
                "buffer has {} channels, container has {}",
                buffer.channel_count(),
                self.format.channels
            )));
        }
        let cut_short = self.take_injected_failure();
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::Write("file is closed".into()))?;

        let data = wav_format::interleave_le_bytes(buffer);
        let written = if cut_short {
            file.write_all(&data[..data.len() / 2])
                .and_then(|_| Err(io::Error::new(io::ErrorKind::StorageFull, "no space left on device")))
        } else {
            file.write_all(&data)
        };
        if let Err(e) = written {
            rollback(file, self.committed_bytes);
            return Err(CaptureError::Write(e.to_string()));
        }

        self.committed_bytes += data.len() as u64;
        self.frames_written += buffer.frame_count() as u64;
        Ok(())
    }

    /// Finalize the file: patch header sizes, flush, and return the SHA-256 checksum.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::Storage("file is not open".into()))?;

        for (offset, value) in wav_format::size_patches(self.frames_written, self.format.channels) {
            file.seek(SeekFrom::Start(offset as u64))
                .and_then(|_| file.write_all(&value.to_le_bytes()))
                .map_err(|e| CaptureError::Storage(format!("failed to patch header: {}", e)))?;
        }
        file.sync_all()
            .map_err(|e| CaptureError::Storage(format!("failed to flush: {}", e)))?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Make the next `count` appends write half their bytes and then fail.
    #[cfg(test)]
    pub(crate) fn fail_next_appends(&mut self, count: u32) {
        self.injected_failures = count;
    }

    #[cfg(test)]
    fn take_injected_failure(&mut self) -> bool {
        let inject = self.injected_failures > 0;
        self.injected_failures = self.injected_failures.saturating_sub(1);
        inject
    }

    #[cfg(not(test))]
    fn take_injected_failure(&mut self) -> bool {
        false
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn format(&self) -> &NegotiatedFormat {
        &self.format
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn rollback(file: &mut File, committed: u64) {
    if let Err(e) = file.set_len(committed).and_then(|_| file.seek(SeekFrom::Start(committed))) {
        log::warn!("Failed to roll back partial write: {}", e);
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file =
        File::open(path).map_err(|e| CaptureError::Storage(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::Storage(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Create the parent directories of `path` if it has any.
pub fn ensure_parent_dir(path: &Path) -> Result<(), CaptureError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| CaptureError::Storage(format!("failed to create directory: {}", e))),
        _ => Ok(()),
    }
}
