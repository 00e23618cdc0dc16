//! Cooperative cancellation flag shared between a caller and an
//! in-progress alignment call. Checked at the top of each frame-loop
//! iteration in feature extraction and correlation; never interrupts
//! mid-frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AlignError;

/// Clone-and-share cancellation flag. Cloning shares the same underlying
/// flag; `cancel()` on any clone is observed by all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(AlignError::Cancelled)` if cancellation has been requested,
    /// `Ok(())` otherwise. Intended to be called at the top of every
    /// frame-loop iteration.
    pub fn check(&self) -> Result<(), AlignError> {
        if self.is_cancelled() {
            Err(AlignError::Cancelled("operation cancelled by caller".into()))
        } else {
            Ok(())
        }
    }
}
