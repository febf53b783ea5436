//! Cooperative cancellation for training runs

use crate::error::{CostError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop signal, raised once and never cleared
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `TrainingFailed` once raised
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CostError::TrainingFailed("training cancelled".into()));
        }
        Ok(())
    }
}
