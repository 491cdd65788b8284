//! CPU-GPU frame pacing.
//!
//! The [`FramePacer`] is a counting semaphore that starts with one permit per
//! frame that may be in flight. The submitting thread takes a permit when it
//! opens a frame; the GPU completion callback of that frame hands it back
//! through a [`FrameSignal`].
//!
//! ```text
//! permits: 2      1      0      0 (blocked)   1 (frame 1 done)  0
//!          |      |      |      |             |                 |
//! CPU:   open 1 open 2  ...   open 3 ───────wait──────────────► open 3
//! GPU:          run 1 ──────────────────────► done 1
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Interval at which a blocked acquire re-runs its pump closure.
const PUMP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct PacerShared {
    available: Mutex<usize>,
    released: Condvar,
    permits: usize,
}

impl PacerShared {
    fn signal(&self) {
        let mut available = self.available.lock();
        assert!(
            *available < self.permits,
            "frame pacer signaled more often than acquired"
        );
        *available += 1;
        self.released.notify_one();
    }
}

/// Counting semaphore bounding the number of frames in flight.
#[derive(Debug)]
pub struct FramePacer {
    shared: Arc<PacerShared>,
}

impl FramePacer {
    /// Create a pacer allowing `frames_in_flight` frames on the GPU at once.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        Self {
            shared: Arc::new(PacerShared {
                available: Mutex::new(frames_in_flight),
                released: Condvar::new(),
                permits: frames_in_flight,
            }),
        }
    }

    /// Take a permit, blocking until one is available.
    pub fn acquire(&self) {
        self.acquire_with(|| {});
    }

    /// Take a permit, calling `pump` whenever none is available.
    ///
    /// Drivers whose completion callbacks only run while the device is polled
    /// pass their poll routine here. The pacer lock is not held while `pump`
    /// runs, so the callback may signal from inside it.
    pub fn acquire_with(&self, mut pump: impl FnMut()) {
        let mut available = self.shared.available.lock();
        while *available == 0 {
            MutexGuard::unlocked(&mut available, &mut pump);
            if *available == 0 {
                self.shared
                    .released
                    .wait_for(&mut available, PUMP_INTERVAL);
            }
        }
        *available -= 1;
    }

    /// Take a permit if one is available, without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut available = self.shared.available.lock();
        if *available == 0 {
            return false;
        }
        *available -= 1;
        true
    }

    /// Take a permit, giving up after `timeout`.
    ///
    /// Returns `true` if a permit was taken.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut available = self.shared.available.lock();
        while *available == 0 {
            if self
                .shared
                .released
                .wait_until(&mut available, deadline)
                .timed_out()
            {
                break;
            }
        }
        if *available == 0 {
            return false;
        }
        *available -= 1;
        true
    }

    /// Return a permit taken on the submitting thread.
    pub fn release(&self) {
        self.shared.signal();
    }

    /// Handle used by completion callbacks to return a permit.
    pub fn signal_handle(&self) -> FrameSignal {
        FrameSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        *self.shared.available.lock()
    }

    /// Total number of permits.
    pub fn permits(&self) -> usize {
        self.shared.permits
    }

    /// Check whether every permit is back, i.e. no frame is in flight.
    pub fn is_idle(&self) -> bool {
        self.available() == self.permits()
    }
}

/// Returns one permit to a [`FramePacer`] when a frame completes on the GPU.
///
/// This is the only state a completion callback touches. It may be sent to
/// and fired from any thread.
#[derive(Debug, Clone)]
pub struct FrameSignal {
    shared: Arc<PacerShared>,
}

impl FrameSignal {
    /// Mark one frame as completed.
    pub fn signal(&self) {
        self.shared.signal();
    }
}

static_assertions::assert_impl_all!(FramePacer: Send, Sync);
static_assertions::assert_impl_all!(FrameSignal: Send, Sync, Clone);
