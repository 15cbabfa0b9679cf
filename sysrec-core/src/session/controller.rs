use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::{DeliveredBatch, OutputKind, SessionStats};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::{self, RecordingMetadata, RecordingResult};
use crate::models::state::{CaptureState, StateCell};
use crate::session::streaming_writer::{StreamingWriter, WriteOutcome};
use crate::traits::capture_delegate::{BatchSink, CaptureDelegate, LifecycleObserver};
use crate::traits::capture_provider::{self, CaptureSource, CaptureStream, ContentProvider};

/// What a call to [`CaptureController::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed.
    AlreadyCapturing,
}

struct ActiveWriter {
    generation: u64,
    writer: StreamingWriter,
}

/// State shared between the controller, the delivery thread and teardown.
struct Shared {
    state: StateCell,
    verbose: AtomicBool,
    /// Bumped on every start so stale handles from an earlier session are ignored.
    generation: AtomicU64,
    writer: Mutex<Option<ActiveWriter>>,
    stats: Mutex<SessionStats>,
    /// First session-fatal error; later batches are dropped once set.
    failure: Mutex<Option<CaptureError>>,
    /// `None` once taken, or when the session ended without audio.
    outcome: Mutex<Option<Result<RecordingResult, CaptureError>>>,
    /// Serializes start and teardown; holds the live stream.
    control: Mutex<Option<Box<dyn CaptureStream>>>,
    signal: Mutex<()>,
    settled: Condvar,
    delegate: Mutex<Option<Arc<dyn CaptureDelegate>>>,
}

fn is_settled(state: CaptureState) -> bool {
    matches!(state, CaptureState::Idle | CaptureState::Stopped)
}

impl Shared {
    fn new() -> Self {
        Self {
            state: StateCell::new(CaptureState::Idle),
            verbose: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            writer: Mutex::new(None),
            stats: Mutex::new(SessionStats::default()),
            failure: Mutex::new(None),
            outcome: Mutex::new(None),
            control: Mutex::new(None),
            signal: Mutex::new(()),
            settled: Condvar::new(),
            delegate: Mutex::new(None),
        }
    }

    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.lock().clone()
    }

    fn announce(&self, state: CaptureState) {
        {
            let _guard = self.signal.lock();
            self.settled.notify_all();
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(&state);
        }
    }

    fn report(&self, error: &CaptureError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    /// Keep the first fatal error of a session.
    fn record_failure(&self, error: &CaptureError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error.clone());
        }
    }

    fn handle_batch(self: &Arc<Self>, generation: u64, batch: &DeliveredBatch<'_>) {
        let written = {
            let mut guard = self.writer.lock();
            let active = match guard.as_mut() {
                Some(active) if active.generation == generation && self.state.load().is_active() => active,
                _ => {
                    self.stats.lock().late_batches += 1;
                    return;
                }
            };

            self.stats.lock().batches_received += 1;
            if self.failure.lock().is_some() {
                self.stats.lock().batches_dropped += 1;
                return;
            }

            let level = if self.verbose.load(Ordering::Relaxed) {
                log::Level::Info
            } else {
                log::Level::Trace
            };
            log::log!(
                level,
                "Received audio batch: {} frames at {:.2}s",
                batch.frame_count,
                batch.presentation_time_secs
            );

            let written = active.writer.write(batch);
            let mut stats = self.stats.lock();
            match &written {
                Ok(outcome) => {
                    stats.batches_written += 1;
                    stats.frames_written += outcome.frames() as u64;
                }
                Err(_) => stats.batches_dropped += 1,
            }
            written
        };

        match written {
            Ok(WriteOutcome::Negotiated { .. }) => {
                if self.state.transition(CaptureState::Starting, CaptureState::Streaming).is_ok() {
                    self.announce(CaptureState::Streaming);
                }
            }
            Ok(WriteOutcome::Appended { .. }) => {}
            Err(error) if error.is_session_fatal() => {
                log::error!("Capture cannot continue: {}", error);
                self.record_failure(&error);
                self.report(&error);
                self.spawn_teardown(generation);
            }
            Err(error) => {
                log::warn!("Dropped audio batch: {}", error);
                self.report(&error);
            }
        }
    }

    /// Tear the session down off the delivery thread, which `stop_capture` may join.
    fn spawn_teardown(self: &Arc<Self>, generation: u64) {
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("capture-teardown".into())
            .spawn(move || {
                shared.teardown(Some(generation));
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn teardown thread: {}", e);
        }
    }

    /// Stop the stream and finalize the container. Only the first caller for
    /// a session does anything; everyone else returns `false`.
    fn teardown(&self, generation: Option<u64>) -> bool {
        let mut control = self.control.lock();
        if generation.is_some_and(|g| g != self.generation.load(Ordering::Acquire)) {
            return false;
        }
        let previous = match self
            .state
            .transition_from_any(&[CaptureState::Starting, CaptureState::Streaming], CaptureState::Stopping)
        {
            Ok(previous) => previous,
            Err(_) => return false,
        };

        log::info!("Stopping audio capture...");
        log::debug!("Teardown from {}", previous);
        self.announce(CaptureState::Stopping);

        if let Some(mut stream) = control.take() {
            if let Err(e) = stream.stop_capture() {
                log::warn!("Capture source did not stop cleanly: {}", e);
                self.report(&e);
            }
        }

        // Waits for an in-flight append to finish.
        let finalized = match self.writer.lock().take() {
            Some(mut active) => active.writer.finalize(),
            None => Ok(None),
        };
        let stats = *self.stats.lock();
        let failure = self.failure.lock().clone();

        let outcome = match (failure, finalized) {
            (Some(error), finalized) => {
                if let Err(e) = finalized {
                    log::error!("Failed to finalize audio file: {}", e);
                }
                Some(Err(error))
            }
            (None, Err(e)) => {
                log::error!("Failed to finalize audio file: {}", e);
                self.report(&e);
                Some(Err(e))
            }
            (None, Ok(None)) => {
                log::warn!("No audio was captured; no file written");
                None
            }
            (None, Ok(Some(container))) => {
                let path = container.file_path.to_string_lossy().into_owned();
                let metadata =
                    RecordingMetadata::new(&path, &container.format, container.frames_written, &container.checksum);
                Some(Ok(RecordingResult {
                    duration_secs: recording_result::duration_secs(
                        container.frames_written,
                        container.format.sample_rate,
                    ),
                    file_path: container.file_path,
                    format: container.format,
                    frames_written: container.frames_written,
                    stats,
                    checksum: container.checksum,
                    metadata,
                }))
            }
        };

        if let (Some(Ok(result)), Some(delegate)) = (&outcome, self.delegate()) {
            delegate.on_capture_finished(result);
        }
        *self.outcome.lock() = outcome;
        self.state.store(CaptureState::Stopped);
        log::info!(
            "Audio capture stopped. {} batches written, {} dropped, {} late",
            stats.batches_written,
            stats.batches_dropped,
            stats.late_batches
        );
        self.announce(CaptureState::Stopped);
        true
    }
}

/// What the capture stream holds on to: routes batches and stream errors
/// back to the session that registered it.
struct SessionHandle {
    shared: Weak<Shared>,
    generation: u64,
}

impl BatchSink for SessionHandle {
    fn on_batch(&self, batch: &DeliveredBatch<'_>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_batch(self.generation, batch);
        }
    }
}

impl LifecycleObserver for SessionHandle {
    fn on_stream_error(&self, error: CaptureError) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        log::error!("Capture stream stopped with error: {}", error);
        shared.record_failure(&error);
        shared.report(&error);
        shared.spawn_teardown(self.generation);
    }
}

/// Cloneable trigger for stopping a session from another thread (e.g. a
/// signal handler).
#[derive(Clone)]
pub struct StopHandle {
    shared: Weak<Shared>,
}

impl StopHandle {
    /// Returns `true` if this call stopped a running session.
    pub fn request_stop(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.teardown(None))
    }
}

/// Drives one capture session at a time.
///
/// ```text
/// [ContentProvider] → target → [CaptureSource] → stream ─batches→ [StreamingWriter] → WAV
/// ```
///
/// The file is created lazily from the first batch's format. Teardown can be
/// triggered by [`stop`](Self::stop), a [`StopHandle`], a fatal stream error,
/// or a fatal write error; whichever comes first wins and the rest are no-ops.
pub struct CaptureController<P, S>
where
    P: ContentProvider,
    S: CaptureSource<Target = P::Target>,
{
    provider: P,
    source: S,
    shared: Arc<Shared>,
}

impl<P, S> CaptureController<P, S>
where
    P: ContentProvider,
    S: CaptureSource<Target = P::Target>,
{
    pub fn new(provider: P, source: S) -> Self {
        Self {
            provider,
            source,
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state.load()
    }

    pub fn stats(&self) -> SessionStats {
        *self.shared.stats.lock()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Start capturing into `config.output_path`.
    ///
    /// Setup failures are returned here and leave the controller idle with no
    /// file created. Enumeration runs before the controller leaves idle, so a
    /// failure there changes no state. The output file itself only appears
    /// once the first batch has been negotiated.
    pub fn start(&self, config: &CaptureConfiguration) -> Result<StartOutcome, CaptureError> {
        config.validate().map_err(CaptureError::Configuration)?;
        self.source.check_platform()?;

        let mut control = self.shared.control.lock();
        if !self.shared.state.load().can_start() {
            log::warn!("Already capturing audio");
            return Ok(StartOutcome::AlreadyCapturing);
        }

        let prepared = capture_provider::first_capture_target(&self.provider).and_then(|target| {
            let writer = StreamingWriter::open(config.output_path.clone(), config.max_consecutive_write_failures)?;
            Ok((target, writer))
        });
        let (target, writer) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("Failed to start audio capture: {}", e);
                return Err(e);
            }
        };

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *self.shared.outcome.lock() = None;
        *self.shared.failure.lock() = None;
        *self.shared.stats.lock() = SessionStats::default();
        self.shared.verbose.store(config.verbose, Ordering::Relaxed);
        *self.shared.writer.lock() = Some(ActiveWriter { generation, writer });
        self.shared.state.store(CaptureState::Starting);
        self.shared.announce(CaptureState::Starting);

        match self.open_stream(&target, config, generation) {
            Ok(stream) => {
                *control = Some(stream);
                log::info!("Starting audio capture to {}", config.output_path.display());
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                log::error!("Failed to start audio capture: {}", e);
                self.shared.writer.lock().take();
                self.shared.state.store(CaptureState::Idle);
                self.shared.announce(CaptureState::Idle);
                Err(e)
            }
        }
    }

    fn open_stream(
        &self,
        target: &P::Target,
        config: &CaptureConfiguration,
        generation: u64,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let handle = Arc::new(SessionHandle {
            shared: Arc::downgrade(&self.shared),
            generation,
        });
        let mut stream = self.source.configure(target, &config.stream, handle.clone())?;
        stream.add_output(handle, OutputKind::Audio)?;
        stream.start_capture()?;
        Ok(stream)
    }

    /// Begin teardown without waiting for the outcome. Returns `true` if this
    /// call stopped a running session.
    pub fn request_stop(&self) -> bool {
        self.shared.teardown(None)
    }

    /// Stop the session and hand back its outcome.
    ///
    /// `Ok(None)` when nothing was running, nothing was captured, or the
    /// outcome was already collected. A session that ended on a fatal error
    /// reports it here; its file, if one was created, is still finalized.
    pub fn stop(&self) -> Result<Option<RecordingResult>, CaptureError> {
        self.request_stop();
        self.shared.outcome.lock().take().transpose()
    }

    /// Block until the session has ended, or until `timeout` elapses.
    ///
    /// Returns `true` if the controller is idle or stopped.
    pub fn wait_until_stopped(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut guard = self.shared.signal.lock();
        loop {
            if is_settled(self.shared.state.load()) {
                return true;
            }
            match deadline {
                None => self.shared.settled.wait(&mut guard),
                Some(deadline) => {
                    if self.shared.settled.wait_until(&mut guard, deadline).timed_out() {
                        return is_settled(self.shared.state.load());
                    }
                }
            }
        }
    }
}

impl<P, S> Drop for CaptureController<P, S>
where
    P: ContentProvider,
    S: CaptureSource<Target = P::Target>,
{
    fn drop(&mut self) {
        self.shared.teardown(None);
    }
}
