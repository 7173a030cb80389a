//! # Flush Policies
//!
//! Decide when the ledger's in-memory state is written to its file.
//!
//! The ledger calls [`FlushPolicy::should_flush`] after every operation and,
//! when it answers yes, calls [`FlushPolicy::notify_flush`] *before* writing.
//! A failing disk therefore waits out a full interval instead of being
//! retried on every mutation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default staleness threshold.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Strategy deciding when a pending flush is due.
pub trait FlushPolicy: Send {
    /// Whether a flush is due now.
    fn should_flush(&self) -> bool;

    /// Records that a flush is being performed.
    fn notify_flush(&mut self);
}

/// Time source for [`StalenessPolicy`].
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the clock forward. Clones share the same time.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Flushes once the last flush is older than a threshold.
#[derive(Debug)]
pub struct StalenessPolicy<C: Clock = SystemClock> {
    clock: C,
    threshold: Duration,
    last_flush: Instant,
}

impl StalenessPolicy {
    /// Creates a policy on the system clock. The interval starts now.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self::with_clock(threshold, SystemClock)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

impl<C: Clock> StalenessPolicy<C> {
    /// Creates a policy on a custom clock.
    #[must_use]
    pub fn with_clock(threshold: Duration, clock: C) -> Self {
        let last_flush = clock.now();
        Self {
            clock,
            threshold,
            last_flush,
        }
    }

    /// The configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl<C: Clock> FlushPolicy for StalenessPolicy<C> {
    fn should_flush(&self) -> bool {
        self.clock.now().saturating_duration_since(self.last_flush) > self.threshold
    }

    fn notify_flush(&mut self) {
        self.last_flush = self.clock.now();
    }
}

/// Flushes after every operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysFlush;

impl FlushPolicy for AlwaysFlush {
    fn should_flush(&self) -> bool {
        true
    }

    fn notify_flush(&mut self) {}
}

/// Never flushes on its own; only shutdown writes the file.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverFlush;

impl FlushPolicy for NeverFlush {
    fn should_flush(&self) -> bool {
        false
    }

    fn notify_flush(&mut self) {}
}

/// Flushes after a fixed number of checks since the last flush.
#[derive(Debug)]
pub struct EveryNthCheck {
    every: u32,
    checks: std::sync::atomic::AtomicU32,
}

impl EveryNthCheck {
    /// Creates a policy that flushes on every `every`-th check (minimum 1).
    #[must_use]
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            checks: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl FlushPolicy for EveryNthCheck {
    fn should_flush(&self) -> bool {
        let seen = self.checks.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        seen >= self.every
    }

    fn notify_flush(&mut self) {
        *self.checks.get_mut() = 0;
    }
}
