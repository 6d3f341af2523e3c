//! Cooperative progress reporting and cancellation

use crate::types::{DimapError, DimapResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Progress/cancellation token shared between a caller and a long-running
/// header parse, header write or raster scan.
///
/// Clones share state, so a UI thread can hold one clone and call
/// [`ProgressMonitor::cancel`] while the worker checks another.
#[derive(Debug, Clone, Default)]
pub struct ProgressMonitor {
    cancelled: Arc<AtomicBool>,
    work_done: Arc<AtomicU64>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        log::info!("Cancellation requested");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancellation checkpoint
    pub fn check(&self) -> DimapResult<()> {
        if self.is_cancelled() {
            Err(DimapError::UserCancelled)
        } else {
            Ok(())
        }
    }

    pub fn worked(&self, units: u64) {
        self.work_done.fetch_add(units, Ordering::Relaxed);
    }

    pub fn work_done(&self) -> u64 {
        self.work_done.load(Ordering::Relaxed)
    }
}
