use crate::models::audio_models::DeliveredBatch;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Receives audio batches from a capture stream.
///
/// Called on the source's delivery thread. The batch borrows source-owned
/// memory, so implementations must finish with it before returning.
pub trait BatchSink: Send + Sync {
    fn on_batch(&self, batch: &DeliveredBatch<'_>);
}

/// Receives lifecycle notifications from a capture stream.
pub trait LifecycleObserver: Send + Sync {
    /// The stream stopped on its own with an unrecoverable error.
    fn on_stream_error(&self, error: CaptureError);
}

/// Event delegate for capture session notifications.
///
/// Methods are called from whichever thread drove the change: the caller's,
/// the delivery thread, or the teardown thread.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called for errors that do not come back to a caller: dropped batches,
    /// teardown failures, and session-fatal errors raised while streaming.
    fn on_error(&self, error: &CaptureError);

    /// Called when the container is finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}
