use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::OutputKind;
use crate::models::config::StreamOptions;
use crate::models::error::CaptureError;
use crate::traits::capture_delegate::{BatchSink, LifecycleObserver};

/// One-shot completion for an asynchronous request.
///
/// Consuming `complete` means a result is delivered at most once; dropping
/// the completion unresolved wakes the waiter with an error, so it never
/// waits on nothing.
pub struct Completion<T> {
    tx: mpsc::SyncSender<Result<T, CaptureError>>,
}

impl<T> Completion<T> {
    pub fn complete(self, result: Result<T, CaptureError>) {
        // The waiter may have timed out and gone away.
        let _ = self.tx.send(result);
    }
}

/// Blocking side of a [`Completion`].
pub struct CompletionWaiter<T> {
    rx: mpsc::Receiver<Result<T, CaptureError>>,
}

impl<T> CompletionWaiter<T> {
    pub fn wait(self) -> Result<T, CaptureError> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Enumeration("request dropped without a result".into())))
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<T, CaptureError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(CaptureError::Enumeration(format!(
                "no answer within {:.1}s",
                timeout.as_secs_f64()
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(CaptureError::Enumeration("request dropped without a result".into()))
            }
        }
    }
}

pub fn completion<T>() -> (Completion<T>, CompletionWaiter<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Completion { tx }, CompletionWaiter { rx })
}

/// Lists what can be captured (displays, on macOS).
pub trait ContentProvider: Send + Sync {
    /// Opaque capture target handed back to the [`CaptureSource`].
    type Target: Send + 'static;

    /// Request the available targets. `completion` may be resolved on any thread.
    fn request_capture_targets(&self, completion: Completion<Vec<Self::Target>>);
}

/// Blocks until `provider` answers and returns the first available target.
pub fn first_capture_target<P: ContentProvider + ?Sized>(provider: &P) -> Result<P::Target, CaptureError> {
    let (done, waiter) = completion();
    provider.request_capture_targets(done);
    waiter
        .wait()?
        .into_iter()
        .next()
        .ok_or_else(|| CaptureError::Enumeration("no display available for capture".into()))
}

/// Factory for platform capture streams.
pub trait CaptureSource: Send + Sync {
    type Target: Send + 'static;

    /// Fails with `UnsupportedPlatform` when this machine cannot capture audio.
    ///
    /// Runs once, before any session state changes.
    fn check_platform(&self) -> Result<(), CaptureError>;

    /// Build a stream for `target`. `observer` receives fatal stream errors.
    fn configure(
        &self,
        target: &Self::Target,
        options: &StreamOptions,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// Handle to one configured capture stream.
pub trait CaptureStream: Send {
    /// Register `sink` for outputs of `kind`.
    fn add_output(&mut self, sink: Arc<dyn BatchSink>, kind: OutputKind) -> Result<(), CaptureError>;

    /// Begin delivering batches on the source's own thread.
    fn start_capture(&mut self) -> Result<(), CaptureError>;

    /// Ask the source to stop and block until it acknowledges.
    ///
    /// A batch already in flight may still arrive after this returns.
    fn stop_capture(&mut self) -> Result<(), CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct ThreadedProvider(Result<Vec<u32>, CaptureError>);

    impl ContentProvider for ThreadedProvider {
        type Target = u32;

        fn request_capture_targets(&self, completion: Completion<Vec<u32>>) {
            let result = self.0.clone();
            thread::spawn(move || completion.complete(result));
        }
    }

    struct SilentProvider;

    impl ContentProvider for SilentProvider {
        type Target = u32;

        fn request_capture_targets(&self, completion: Completion<Vec<u32>>) {
            drop(completion);
        }
    }

    #[test]
    fn first_target_is_selected() {
        let provider = ThreadedProvider(Ok(vec![7, 8]));
        assert_eq!(first_capture_target(&provider), Ok(7));
    }

    #[test]
    fn empty_target_list_is_enumeration_error() {
        let provider = ThreadedProvider(Ok(Vec::new()));
        assert!(matches!(first_capture_target(&provider), Err(CaptureError::Enumeration(_))));
    }

    #[test]
    fn provider_failure_propagates() {
        let provider = ThreadedProvider(Err(CaptureError::Enumeration("denied".into())));
        assert_eq!(
            first_capture_target(&provider),
            Err(CaptureError::Enumeration("denied".into()))
        );
    }

    #[test]
    fn dropped_completion_does_not_hang() {
        assert!(matches!(first_capture_target(&SilentProvider), Err(CaptureError::Enumeration(_))));
    }

    #[test]
    fn wait_timeout_expires() {
        let (_done, waiter) = completion::<u32>();
        let result = waiter.wait_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(CaptureError::Enumeration(_))));
    }
}
