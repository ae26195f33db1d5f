//! Cooperative cancellation
//!
//! A cloneable flag checked between pipeline steps and between copy chunks.
//! Setting it never interrupts a step midway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ft_error::{FwtapError, Result};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FwtapError::Cancelled)
        } else {
            Ok(())
        }
    }
}
