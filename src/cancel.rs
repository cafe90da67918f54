use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness signal shared between a multi-tick routine and its owner.
///
/// Routines check it at every suspension point and stop touching shared
/// state once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
