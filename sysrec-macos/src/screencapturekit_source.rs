//! ScreenCaptureKit capture source.
//!
//! ScreenCaptureKit only captures through a content filter, so a display is
//! used as the target even though no video is consumed. Audio arrives on a
//! ScreenCaptureKit dispatch queue and is handed to the session's sink
//! without copying.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use screencapturekit::prelude::*;

use sysrec_core::models::audio_models::{DeliveredBatch, OutputKind, SourceBuffer};
use sysrec_core::models::config::StreamOptions;
use sysrec_core::models::error::CaptureError;
use sysrec_core::traits::capture_delegate::{BatchSink, LifecycleObserver};
use sysrec_core::traits::capture_provider::{CaptureSource, CaptureStream, Completion, ContentProvider};

use crate::{batch_layout, permissions};

/// Smallest frame size ScreenCaptureKit accepts; video frames are ignored.
const VIDEO_EDGE: u32 = 64;

/// Lists the displays available to ScreenCaptureKit.
#[derive(Debug, Default)]
pub struct ShareableDisplays;

impl ContentProvider for ShareableDisplays {
    type Target = SCDisplay;

    fn request_capture_targets(&self, completion: Completion<Vec<SCDisplay>>) {
        let displays = SCShareableContent::get()
            .map(|content| content.displays())
            .map_err(|e| CaptureError::Enumeration(format!("failed to get shareable content: {:?}", e)));
        completion.complete(displays);
    }
}

/// Builds system-audio streams on a display filter.
#[derive(Debug, Default)]
pub struct ScreenCaptureAudioSource;

impl CaptureSource for ScreenCaptureAudioSource {
    type Target = SCDisplay;

    fn check_platform(&self) -> Result<(), CaptureError> {
        permissions::check_platform()
    }

    fn configure(
        &self,
        display: &SCDisplay,
        options: &StreamOptions,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let filter = SCContentFilter::builder().display(display).exclude_windows(&[]).build();

        let mut config = SCStreamConfiguration::new()
            .with_width(VIDEO_EDGE)
            .with_height(VIDEO_EDGE)
            .with_captures_audio(options.captures_audio)
            .with_excludes_current_process_audio(options.excludes_current_process_audio);
        if let Some(rate) = options.sample_rate {
            config = config.with_sample_rate(rate as _);
        }
        if let Some(channels) = options.channel_count {
            config = config.with_channel_count(channels as _);
        }

        let errors = StreamErrorForwarder {
            observer: Mutex::new(Some(observer)),
        };
        let stream = SCStream::new_with_delegate(&filter, &config, errors);
        log::debug!(
            "Configured ScreenCaptureKit stream (excludes own audio: {})",
            options.excludes_current_process_audio
        );

        Ok(Box::new(ScreenCaptureStream { stream }))
    }
}

struct ScreenCaptureStream {
    stream: SCStream,
}

impl CaptureStream for ScreenCaptureStream {
    fn add_output(&mut self, sink: Arc<dyn BatchSink>, kind: OutputKind) -> Result<(), CaptureError> {
        let output_type = match kind {
            OutputKind::Audio => SCStreamOutputType::Audio,
            OutputKind::Screen => SCStreamOutputType::Screen,
        };
        self.stream.add_output_handler(
            AudioOutput {
                sink,
                frames_seen: AtomicU64::new(0),
            },
            output_type,
        );
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CaptureError> {
        self.stream.start_capture().map_err(|e| {
            CaptureError::Configuration(format!(
                "failed to start capture: {:?}. Check Screen Recording permission in \
                 System Settings > Privacy & Security > Screen Recording",
                e
            ))
        })
    }

    fn stop_capture(&mut self) -> Result<(), CaptureError> {
        self.stream
            .stop_capture()
            .map_err(|e| CaptureError::StreamFatal(format!("failed to stop capture: {:?}", e)))
    }
}

/// Forwards audio sample buffers to the session sink.
struct AudioOutput {
    sink: Arc<dyn BatchSink>,
    frames_seen: AtomicU64,
}

impl SCStreamOutputTrait for AudioOutput {
    fn did_output_sample_buffer(&self, sample: CMSampleBuffer, output_type: SCStreamOutputType) {
        if !matches!(output_type, SCStreamOutputType::Audio) {
            return;
        }
        let Some(buffer_list) = sample.audio_buffer_list() else {
            log::debug!("Audio sample buffer without a buffer list");
            return;
        };

        let segments: Vec<_> = buffer_list.iter().collect();
        let buffers: Vec<SourceBuffer<'_>> = segments
            .iter()
            .map(|segment| SourceBuffer {
                channels: segment.number_channels,
                data: segment.data(),
            })
            .collect();

        let sample_rate = sample.format_description().and_then(|d| d.audio_sample_rate());
        let frame_count = batch_layout::frame_count(&buffers);
        let frames_before = self.frames_seen.fetch_add(frame_count as u64, Ordering::Relaxed);

        let batch = DeliveredBatch {
            presentation_time_secs: batch_layout::elapsed_secs(frames_before, sample_rate),
            frame_count,
            descriptor: batch_layout::describe(sample_rate, &buffers),
            buffers,
        };
        self.sink.on_batch(&batch);
    }
}

/// Reports the first stream failure to the session.
struct StreamErrorForwarder {
    observer: Mutex<Option<Arc<dyn LifecycleObserver>>>,
}

impl SCStreamDelegateTrait for StreamErrorForwarder {
    fn did_stop_with_error(&self, error: SCError) {
        if let Some(observer) = self.observer.lock().take() {
            observer.on_stream_error(CaptureError::StreamFatal(format!("{:?}", error)));
        }
    }
}
