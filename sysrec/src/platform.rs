//! Capture backend for the platform this binary was built for.

use sysrec_core::CaptureController;

#[cfg(target_os = "macos")]
pub use sysrec_macos::{ScreenCaptureAudioSource as Source, ShareableDisplays as Provider};

#[cfg(not(target_os = "macos"))]
pub use self::unsupported::{UnsupportedProvider as Provider, UnsupportedSource as Source};

pub fn controller() -> CaptureController<Provider, Source> {
    CaptureController::new(Provider::default(), Source::default())
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use std::sync::Arc;

    use sysrec_core::models::config::StreamOptions;
    use sysrec_core::traits::capture_provider::{CaptureSource, CaptureStream, Completion, ContentProvider};
    use sysrec_core::{CaptureError, LifecycleObserver};

    fn unsupported() -> CaptureError {
        CaptureError::UnsupportedPlatform(format!(
            "system audio capture needs macOS ScreenCaptureKit; this is {}",
            std::env::consts::OS
        ))
    }

    #[derive(Debug, Default)]
    pub struct UnsupportedProvider;

    impl ContentProvider for UnsupportedProvider {
        type Target = ();

        fn request_capture_targets(&self, completion: Completion<Vec<()>>) {
            completion.complete(Err(unsupported()));
        }
    }

    #[derive(Debug, Default)]
    pub struct UnsupportedSource;

    impl CaptureSource for UnsupportedSource {
        type Target = ();

        fn check_platform(&self) -> Result<(), CaptureError> {
            Err(unsupported())
        }

        fn configure(
            &self,
            _target: &(),
            _options: &StreamOptions,
            _observer: Arc<dyn LifecycleObserver>,
        ) -> Result<Box<dyn CaptureStream>, CaptureError> {
            Err(unsupported())
        }
    }
}
