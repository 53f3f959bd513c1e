use std::error::Error;

use tracing::{debug, info};

/// Receives progress events from a running race.
///
/// Every method has a no-op default so implementations only override what
/// they care about. Calls may arrive concurrently from candidate tasks.
pub trait RaceObserver: Send + Sync + 'static {
    /// Candidate `index` has been started.
    fn launched(&self, _index: usize) {}

    /// The stagger interval ran out while candidate `index` was still busy.
    fn stagger_elapsed(&self, _index: usize) {}

    /// Candidate `index` completed before its stagger interval ran out.
    fn finished_early(&self, _index: usize) {}

    /// Candidate `index` failed.
    fn failed(&self, _index: usize, _error: &(dyn Error + Send + Sync + 'static)) {}

    /// Candidate `index` was cancelled before it produced anything.
    fn abandoned(&self, _index: usize) {}

    /// Candidate `index` succeeded after the race had already been decided;
    /// its value was dropped.
    fn discarded(&self, _index: usize) {}

    /// Candidate `index` won the race.
    fn won(&self, _index: usize) {}

    /// The deadline fired after `launched` candidates had been started.
    fn deadline_elapsed(&self, _launched: usize) {}
}

/// Forwards race events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RaceObserver for TracingObserver {
    fn launched(&self, index: usize) {
        debug!(index, "candidate launched");
    }

    fn stagger_elapsed(&self, index: usize) {
        debug!(index, "stagger elapsed, launching next candidate");
    }

    fn finished_early(&self, index: usize) {
        debug!(index, "candidate finished early, launching next candidate");
    }

    fn failed(&self, index: usize, error: &(dyn Error + Send + Sync + 'static)) {
        info!(index, %error, "candidate failed");
    }

    fn abandoned(&self, index: usize) {
        debug!(index, "candidate abandoned");
    }

    fn discarded(&self, index: usize) {
        debug!(index, "late success discarded");
    }

    fn won(&self, index: usize) {
        debug!(index, "candidate won");
    }

    fn deadline_elapsed(&self, launched: usize) {
        info!(launched, "race deadline elapsed");
    }
}
