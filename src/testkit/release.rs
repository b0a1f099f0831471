//! Counting resource for teardown assertions.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::port::ResourceRelease;

/// Counts how many times it was released.
#[derive(Debug)]
pub struct CountingRelease {
    name: String,
    releases: AtomicUsize,
}

impl CountingRelease {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            releases: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ResourceRelease for CountingRelease {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
