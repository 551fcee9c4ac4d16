use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use search_protocol::result::limit_matches;
use search_protocol::{JobContext, SearchEvent, Sender, SharedSender, Stats};

use crate::metrics::METRICS;
use crate::obs;

/// Forwards at most `limit` results, then cancels the context it guards.
///
/// The budget is decremented by each event's result count. The event that
/// crosses the budget is truncated to what remained, and exactly one
/// limit-hit statistics event follows it. Events without results always pass
/// through untouched.
pub struct LimitSender {
    parent: SharedSender,
    limit: usize,
    remaining: AtomicI64,
    limit_hit: AtomicBool,
    ctx: JobContext,
}

impl LimitSender {
    /// `ctx` is canceled the first time the budget is exceeded.
    pub fn new(parent: SharedSender, limit: usize, ctx: JobContext) -> Arc<Self> {
        Arc::new(Self {
            parent,
            limit,
            remaining: AtomicI64::new(i64::try_from(limit).unwrap_or(i64::MAX)),
            limit_hit: AtomicBool::new(false),
            ctx,
        })
    }

    pub fn limit_hit(&self) -> bool {
        self.limit_hit.load(Ordering::SeqCst)
    }
}

impl Sender for LimitSender {
    fn send(&self, mut event: SearchEvent) {
        let count = i64::try_from(event.result_count()).unwrap_or(i64::MAX);
        if count == 0 {
            self.parent.send(event);
            return;
        }

        let after = self.remaining.fetch_sub(count, Ordering::SeqCst) - count;
        let before = after + count;

        if after < 0 {
            let budget = usize::try_from(before.max(0)).unwrap_or(0);
            limit_matches(&mut event.results, budget);
        }

        // Truncated events are still sent: they may carry statistics.
        self.parent.send(event);

        if before >= 0 && after < 0 {
            self.parent.send(SearchEvent::from_stats(Stats::limit_hit()));
            self.limit_hit.store(true, Ordering::SeqCst);
            METRICS.inc_limit_hits();
            obs::emit_limit_hit(self.limit);
            self.ctx.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_protocol::{AggregatingSender, Match, MinimalRepo, RepoMatch};

    fn repos(n: u32) -> Vec<Match> {
        (0..n)
            .map(|i| Match::Repo(RepoMatch::new(MinimalRepo::new(i, &format!("r{i}")))))
            .collect()
    }

    #[test]
    fn test_exact_budget_does_not_hit_limit() {
        let agg = AggregatingSender::new();
        let ctx = JobContext::default();
        let limiter = LimitSender::new(agg.clone(), 3, ctx.clone());
        limiter.send(SearchEvent::from_results(repos(3)));

        assert_eq!(agg.result_count(), 3);
        assert!(!limiter.limit_hit());
        assert!(ctx.err().is_none());
    }

    #[test]
    fn test_crossing_event_is_truncated_and_cancels_once() {
        let agg = AggregatingSender::new();
        let ctx = JobContext::default();
        let limiter = LimitSender::new(agg.clone(), 3, ctx.clone());
        limiter.send(SearchEvent::from_results(repos(2)));
        limiter.send(SearchEvent::from_results(repos(2)));
        limiter.send(SearchEvent::from_results(repos(2)));

        assert_eq!(agg.result_count(), 3);
        assert!(limiter.limit_hit());
        assert!(ctx.is_done());
        // two result events, one limit-hit event, one empty trailing event
        assert_eq!(agg.event_count(), 4);
    }

    #[test]
    fn test_stats_only_events_pass_after_limit() {
        let agg = AggregatingSender::new();
        let limiter = LimitSender::new(agg.clone(), 0, JobContext::default());
        limiter.send(SearchEvent::from_stats(Stats {
            backends_missing: 2,
            ..Stats::default()
        }));
        assert_eq!(agg.stats().backends_missing, 2);
        assert!(!limiter.limit_hit());
    }
}
