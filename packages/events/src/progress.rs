//! Progress reporting for batch geocoding.
//!
//! The CLI renders progress with `indicatif`; library callers and tests
//! pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress from a running batch. Shared by every concurrent
/// request of the batch, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of units the batch will report.
    fn set_total(&self, total: u64);

    fn inc(&self, delta: u64);

    fn set_message(&self, _msg: String) {}

    /// Called once when the batch is done.
    fn finish(&self, msg: String);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
