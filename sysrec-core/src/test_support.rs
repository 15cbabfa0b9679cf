//! In-process capture source for exercising the controller without hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::{DeliveredBatch, FormatDescriptor, OutputKind, SourceBuffer};
use crate::models::config::StreamOptions;
use crate::models::error::CaptureError;
use crate::traits::capture_delegate::{BatchSink, LifecycleObserver};
use crate::traits::capture_provider::{CaptureSource, CaptureStream, Completion, ContentProvider};

/// One scripted delivery, owning its bytes.
#[derive(Debug, Clone)]
pub(crate) struct FakeBatch {
    pub frames: usize,
    pub descriptor: Option<FormatDescriptor>,
    pub segments: Vec<Vec<u8>>,
    /// Pause before this batch is delivered.
    pub delay: Duration,
}

impl FakeBatch {
    /// Planar float batch where channel `i` is filled with `values[i]`.
    pub fn planar(frames: usize, sample_rate: f64, values: &[f32]) -> Self {
        Self {
            frames,
            descriptor: Some(FormatDescriptor::float32_planar(sample_rate, values.len() as u32)),
            segments: values.iter().map(|v| filled(frames, *v)).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn without_descriptor(mut self) -> Self {
        self.descriptor = None;
        self
    }

    fn deliver(&self, sink: &dyn BatchSink, presentation_time_secs: f64) {
        let batch = DeliveredBatch {
            presentation_time_secs,
            frame_count: self.frames,
            buffers: self
                .segments
                .iter()
                .map(|data| SourceBuffer { channels: 1, data })
                .collect(),
            descriptor: self.descriptor,
        };
        sink.on_batch(&batch);
    }
}

pub(crate) fn filled(frames: usize, value: f32) -> Vec<u8> {
    std::iter::repeat(value.to_ne_bytes()).take(frames).flatten().collect()
}

pub(crate) struct FakeProvider {
    pub targets: Result<Vec<u32>, CaptureError>,
}

impl FakeProvider {
    pub fn one_display() -> Self {
        Self { targets: Ok(vec![1]) }
    }
}

impl ContentProvider for FakeProvider {
    type Target = u32;

    fn request_capture_targets(&self, completion: Completion<Vec<u32>>) {
        let targets = self.targets.clone();
        thread::spawn(move || completion.complete(targets));
    }
}

/// Delivers `script` on its own thread once started, then idles until
/// stopped or raises `stream_error`.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub script: Vec<FakeBatch>,
    pub stream_error: Option<CaptureError>,
    /// Delivered from inside `stop_capture`, after the delivery thread is gone.
    pub late_batch: Option<FakeBatch>,
    pub platform_error: Option<CaptureError>,
    pub configured: Mutex<Option<StreamOptions>>,
    pub delivered: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn with_script(script: Vec<FakeBatch>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }
}

impl CaptureSource for FakeSource {
    type Target = u32;

    fn check_platform(&self) -> Result<(), CaptureError> {
        match &self.platform_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn configure(
        &self,
        _target: &u32,
        options: &StreamOptions,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        *self.configured.lock() = Some(options.clone());
        Ok(Box::new(FakeStream {
            script: self.script.clone(),
            stream_error: self.stream_error.clone(),
            late_batch: self.late_batch.clone(),
            observer,
            sink: None,
            stop: Arc::new(AtomicBool::new(false)),
            delivered: Arc::clone(&self.delivered),
            worker: None,
        }))
    }
}

struct FakeStream {
    script: Vec<FakeBatch>,
    stream_error: Option<CaptureError>,
    late_batch: Option<FakeBatch>,
    observer: Arc<dyn LifecycleObserver>,
    sink: Option<Arc<dyn BatchSink>>,
    stop: Arc<AtomicBool>,
    delivered: Arc<AtomicUsize>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CaptureStream for FakeStream {
    fn add_output(&mut self, sink: Arc<dyn BatchSink>, kind: OutputKind) -> Result<(), CaptureError> {
        if kind == OutputKind::Audio {
            self.sink = Some(sink);
        }
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CaptureError> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| CaptureError::Configuration("no audio output registered".into()))?;
        let script = std::mem::take(&mut self.script);
        let stream_error = self.stream_error.take();
        let observer = Arc::clone(&self.observer);
        let stop = Arc::clone(&self.stop);
        let delivered = Arc::clone(&self.delivered);

        self.worker = Some(thread::spawn(move || {
            let mut time = 0.0;
            for batch in &script {
                let due = Instant::now() + batch.delay;
                while Instant::now() < due && !stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
                if stop.load(Ordering::Acquire) {
                    return;
                }
                batch.deliver(sink.as_ref(), time);
                delivered.fetch_add(1, Ordering::AcqRel);
                if let Some(rate) = batch.descriptor.map(|d| d.sample_rate) {
                    time += batch.frames as f64 / rate;
                }
            }
            if let Some(error) = stream_error {
                observer.on_stream_error(error);
                return;
            }
            while !stop.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        }));
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CaptureError> {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let (Some(batch), Some(sink)) = (self.late_batch.take(), &self.sink) {
            batch.deliver(sink.as_ref(), f64::MAX);
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub(crate) fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
