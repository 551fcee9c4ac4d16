use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use search_protocol::{SearchEvent, Sender, SharedSender, Stats};

/// Counts the results passing through.
pub struct CountingSender {
    parent: SharedSender,
    count: AtomicUsize,
}

impl CountingSender {
    pub fn new(parent: SharedSender) -> Arc<Self> {
        Arc::new(Self {
            parent,
            count: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Sender for CountingSender {
    fn send(&self, event: SearchEvent) {
        self.count.fetch_add(event.result_count(), Ordering::SeqCst);
        self.parent.send(event);
    }
}

/// Folds the statistics passing through.
pub struct StatsObservingSender {
    parent: SharedSender,
    stats: Mutex<Stats>,
}

impl StatsObservingSender {
    pub fn new(parent: SharedSender) -> Arc<Self> {
        Arc::new(Self {
            parent,
            stats: Mutex::new(Stats::default()),
        })
    }

    pub fn stats(&self) -> Stats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sender for StatsObservingSender {
    fn send(&self, event: SearchEvent) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(&event.stats);
        self.parent.send(event);
    }
}
