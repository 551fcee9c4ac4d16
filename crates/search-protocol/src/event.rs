//! The streaming protocol: [`SearchEvent`]s pushed into a [`Sender`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::result::{self, Match};
use crate::stats::Stats;

/// An ordered batch of matches plus the statistics gathered alongside them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchEvent {
    pub results: Vec<Match>,
    pub stats: Stats,
}

impl SearchEvent {
    pub fn from_results(results: Vec<Match>) -> Self {
        Self {
            results,
            stats: Stats::default(),
        }
    }

    pub fn from_stats(stats: Stats) -> Self {
        Self {
            results: Vec::new(),
            stats,
        }
    }

    pub fn result_count(&self) -> usize {
        result::result_count(&self.results)
    }
}

/// Receives events from a running job.
///
/// Implementations must tolerate concurrent calls: combinators hand the same
/// sender to children running on different tasks.
pub trait Sender: Send + Sync {
    fn send(&self, event: SearchEvent);
}

/// The form in which senders are passed down a job tree.
pub type SharedSender = Arc<dyn Sender>;

/// Adapts a closure into a [`Sender`].
pub struct SenderFn<F>(pub F);

impl<F> Sender for SenderFn<F>
where
    F: Fn(SearchEvent) + Send + Sync,
{
    fn send(&self, event: SearchEvent) {
        (self.0)(event)
    }
}

/// Wrap a closure as a [`SharedSender`].
pub fn sender_fn<F>(f: F) -> SharedSender
where
    F: Fn(SearchEvent) + Send + Sync + 'static,
{
    Arc::new(SenderFn(f))
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSender;

impl Sender for DiscardSender {
    fn send(&self, _event: SearchEvent) {}
}

#[derive(Debug, Default)]
struct Aggregate {
    results: Vec<Match>,
    stats: Stats,
    events: usize,
}

/// Collects every match and folds every statistic it receives.
#[derive(Debug, Default)]
pub struct AggregatingSender {
    inner: Mutex<Aggregate>,
}

impl AggregatingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn results(&self) -> Vec<Match> {
        self.lock().results.clone()
    }

    pub fn stats(&self) -> Stats {
        self.lock().stats.clone()
    }

    pub fn result_count(&self) -> usize {
        result::result_count(&self.lock().results)
    }

    /// Number of events received, including stats-only ones.
    pub fn event_count(&self) -> usize {
        self.lock().events
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Aggregate> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sender for AggregatingSender {
    fn send(&self, event: SearchEvent) {
        let mut agg = self.lock();
        agg.events += 1;
        agg.results.extend(event.results);
        agg.stats.update(&event.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MinimalRepo;
    use crate::result::RepoMatch;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_aggregating_sender_folds_events() {
        let agg = AggregatingSender::new();
        agg.send(SearchEvent::from_results(vec![Match::Repo(RepoMatch::new(
            MinimalRepo::new(1, "a"),
        ))]));
        agg.send(SearchEvent::from_stats(Stats::limit_hit()));

        assert_eq!(agg.result_count(), 1);
        assert_eq!(agg.event_count(), 2);
        assert!(agg.stats().is_limit_hit);
    }

    #[test]
    fn test_sender_fn_forwards_events() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let sender = sender_fn(move |event| {
            counter.fetch_add(event.results.len() + 1, Ordering::SeqCst);
        });
        sender.send(SearchEvent::default());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
