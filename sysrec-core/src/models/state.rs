use std::sync::atomic::{AtomicU8, Ordering};

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → starting → streaming
///           ↓           ↓
///           └──────→ stopping → stopped
/// ```
///
/// `Stopped` is terminal for one session; the next `start` begins a fresh
/// session from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Starting = 1,
    Streaming = 2,
    Stopping = 3,
    Stopped = 4,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// A session exists and has not begun teardown.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether a `start` request may open a new session from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Starting,
            2 => Self::Streaming,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lock-free holder for the lifecycle state.
///
/// The delivery thread reads it on every batch and the stop trigger may race
/// with it, so every transition goes through compare-and-set.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> CaptureState {
        CaptureState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns the observed state on failure.
    pub fn transition(&self, from: CaptureState, to: CaptureState) -> Result<(), CaptureState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(CaptureState::from_u8)
    }

    /// Move to `to` from whichever state in `from` currently holds.
    ///
    /// Returns the state that was replaced, or the observed state if it was
    /// not in `from`.
    pub fn transition_from_any(
        &self,
        from: &[CaptureState],
        to: CaptureState,
    ) -> Result<CaptureState, CaptureState> {
        let mut current = self.load();
        loop {
            if !from.contains(&current) {
                return Err(current);
            }
            match self.transition(current, to) {
                Ok(()) => return Ok(current),
                Err(observed) => current = observed,
            }
        }
    }

    pub fn store(&self, state: CaptureState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
