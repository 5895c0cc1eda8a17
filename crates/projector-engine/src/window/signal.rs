use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide stop flag. Cheap to clone, raisable from any thread.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        if !self.raised.swap(true, Ordering::AcqRel) {
            log::info!("shutdown requested");
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
