use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction used for pulse holds and settling waits.
///
/// - now(): returns a monotonic Instant
/// - sleep(): blocks for the provided duration (implementations may simulate)
/// - ms_since(): helper to compute elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-clock"))]
mod manual {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct State {
        offset: Duration,
        sleeps: Vec<Duration>,
    }

    /// Deterministic clock whose time only moves when slept or advanced.
    ///
    /// Clones share the same timeline, so a test can keep one handle and give
    /// another to the engine.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        origin: Instant,
        state: Arc<Mutex<State>>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                state: Arc::new(Mutex::new(State::default())),
            }
        }

        /// Advance the clock without recording a sleep.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut st) = self.state.lock() {
                st.offset = st.offset.saturating_add(d);
            }
        }

        /// Total virtual time elapsed since construction.
        pub fn elapsed(&self) -> Duration {
            self.state.lock().map(|st| st.offset).unwrap_or_default()
        }

        /// Every sleep requested so far, in order.
        pub fn sleeps(&self) -> Vec<Duration> {
            self.state
                .lock()
                .map(|st| st.sleeps.clone())
                .unwrap_or_default()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut st) = self.state.lock() {
                st.offset = st.offset.saturating_add(d);
                st.sleeps.push(d);
            }
        }
    }
}
