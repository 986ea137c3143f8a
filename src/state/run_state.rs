use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

/// Global crawl state machine: `Idle <-> Running`
///
/// Transitions are compare-and-swap so two concurrent start requests can
/// never both succeed.
#[derive(Debug, Default)]
pub struct RunState {
    state: AtomicU8,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Attempts `Idle -> Running`; returns false if already running
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Attempts `Running -> Idle`; returns false if already idle
    pub fn finish(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }
}

/// Shared, non-preemptive stop signal for one crawl run
///
/// Cloning shares the underlying flag. Tasks check it before starting and at
/// every loop iteration; fetches already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
