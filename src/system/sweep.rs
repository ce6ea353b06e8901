use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Cancellation flag plus optional deadline for a full-system sweep.
///
/// Cloning shares the flag, so another thread can call [`cancel`] while
/// the sweep runs. Sweeps check it between processes and return what they
/// have so far.
///
/// [`cancel`]: SweepControl::cancel
#[derive(Debug, Clone, Default)]
pub struct SweepControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    /// Per-sweep budget that [`rearm`](SweepControl::rearm) starts again.
    timeout: Option<Duration>,
}

impl SweepControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        SweepControl {
            cancelled: Arc::default(),
            deadline: Some(deadline),
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        SweepControl {
            cancelled: Arc::default(),
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
        }
    }

    /// Control for the next sweep of a multi-sweep operation: same cancel
    /// flag, and the timeout counted again from now. A fixed deadline is
    /// kept as is.
    pub fn rearm(&self) -> Self {
        SweepControl {
            cancelled: Arc::clone(&self.cancelled),
            deadline: match self.timeout {
                Some(t) => Some(Instant::now() + t),
                None => self.deadline,
            },
            timeout: self.timeout,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Result of a sweep; `complete` is false when it was cut short.
#[derive(Debug, Clone, Serialize)]
pub struct Sweep<T> {
    pub items: T,
    pub complete: bool,
}
