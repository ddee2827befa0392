use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::KiraError;

/// Cooperative cancellation flag shared between the engine and whoever drives it.
///
/// Clones observe the same flag. The engine checks it before every stage and
/// the downloader between body chunks.
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

    pub fn check(&self) -> Result<(), KiraError> {
        if self.is_cancelled() {
            return Err(KiraError::Cancelled);
        }
        Ok(())
    }
}
