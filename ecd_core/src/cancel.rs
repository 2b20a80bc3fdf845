//! Cooperative stop signal shared between engines and input handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single shared stop flag.
///
/// Clones observe the same flag. Hand one clone to every engine that should
/// stop together and another to whatever raises the request (a signal
/// handler, a button interrupt). There is no queueing: the flag is either set
/// or not.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder to stop at its next checkpoint.
    #[inline]
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Resume normal operation.
    #[inline]
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
