//! Shared status snapshot
//!
//! Single writer (the supervisor), any number of readers (the web layer).
//! All writes go through one closure under one lock acquisition, so readers
//! always see a consistent snapshot.

use netkeeper_common::StatusSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe handle to the supervisor's status snapshot.
#[derive(Clone, Default)]
pub struct SharedStatus {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the whole snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().clone()
    }

    /// Apply one atomic update. Only the supervisor calls this.
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut StatusSnapshot),
    {
        let mut guard = self.inner.lock();
        f(&mut guard);
    }
}
