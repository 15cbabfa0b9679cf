//! # sysrec-core
//!
//! Platform-agnostic core of the system audio recorder.
//!
//! Provides the capture lifecycle, format negotiation, buffer conversion and
//! float WAV output. Platform backends (ScreenCaptureKit on macOS) implement
//! the `ContentProvider` and `CaptureSource` traits and plug into the generic
//! `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! sysrec-core (this crate)
//! ├── traits/       ← ContentProvider, CaptureSource, CaptureStream, BatchSink, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, batches and formats
//! ├── processing/   ← format negotiation, buffer conversion, WAV header
//! ├── session/      ← CaptureController, StreamingWriter
//! └── storage/      ← WavFileWriter, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    ConvertedBuffer, DeliveredBatch, FormatDescriptor, NegotiatedFormat, OutputKind, SampleRepresentation,
    SessionStats, SourceBuffer,
};
pub use models::config::{CaptureConfiguration, StreamOptions};
pub use models::error::CaptureError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::CaptureState;
pub use session::controller::{CaptureController, StartOutcome, StopHandle};
pub use session::streaming_writer::StreamingWriter;
pub use storage::wav_writer::WavFileWriter;
pub use traits::capture_delegate::{BatchSink, CaptureDelegate, LifecycleObserver};
pub use traits::capture_provider::{CaptureSource, CaptureStream, Completion, ContentProvider};
