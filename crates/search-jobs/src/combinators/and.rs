use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use search_protocol::{sender_fn, Alert, Clients, JobContext, Outcome, SearchEvent, SharedSender};

use super::{merge_outcomes, run_concurrently, DEFAULT_MAX_CONCURRENCY};
use crate::job::Job;
use crate::streaming::Merger;

/// Intersection: forwards a match only once every child has reported it.
///
/// Statistics pass through unconditionally. Matches reported by only some
/// children are never forwarded. If nothing was forwarded and some operand
/// hit its result limit, the job adds an alert explaining that the
/// expression was capped.
#[derive(Debug, Clone, PartialEq)]
pub struct AndJob {
    pub(crate) children: Vec<Job>,
    pub(crate) max_concurrency: usize,
}

impl AndJob {
    pub(crate) fn new(children: Vec<Job>) -> Self {
        Self {
            children,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let merger = Arc::new(Merger::new(self.children.len()));
        let limit_hit = Arc::new(AtomicBool::new(false));
        let sent_results = Arc::new(AtomicBool::new(false));

        let outcomes = run_concurrently(
            "and",
            &self.children,
            ctx,
            clients,
            Some(self.max_concurrency),
            |idx| {
                let parent = Arc::clone(&sender);
                let merger = Arc::clone(&merger);
                let limit_hit = Arc::clone(&limit_hit);
                let sent_results = Arc::clone(&sent_results);
                sender_fn(move |mut event: SearchEvent| {
                    if event.stats.is_limit_hit {
                        limit_hit.store(true, Ordering::SeqCst);
                    }
                    event.results = merger.add_matches(event.results, idx);
                    if !event.results.is_empty() {
                        sent_results.store(true, Ordering::SeqCst);
                    }
                    parent.send(event);
                })
            },
        )
        .await;

        let mut outcome = merge_outcomes(outcomes);
        if !sent_results.load(Ordering::SeqCst) && limit_hit.load(Ordering::SeqCst) {
            outcome.alert =
                Alert::max_priority(outcome.alert, Some(Alert::for_capped_and_expression()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{self, StaticLeaf};
    use search_protocol::{fakes as protocol_fakes, AggregatingSender, Stats};

    #[tokio::test]
    async fn test_and_forwards_intersection_only() {
        let job = Job::and(vec![
            Job::leaf(StaticLeaf::new("a", vec![fakes::repo_event(&[1, 2, 3])])),
            Job::leaf(StaticLeaf::new("b", vec![fakes::repo_event(&[2, 3, 4])])),
        ]);
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;

        assert!(outcome.is_ok());
        let mut ids: Vec<_> = agg.results().iter().map(|m| m.repo().id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_and_adds_capped_alert_when_operand_limited() {
        let job = Job::and(vec![
            Job::leaf(StaticLeaf::new(
                "a",
                vec![fakes::repo_event(&[1]), SearchEvent::from_stats(Stats::limit_hit())],
            )),
            Job::leaf(StaticLeaf::new("b", vec![fakes::repo_event(&[2])])),
        ]);
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;

        assert_eq!(agg.result_count(), 0);
        assert!(agg.stats().is_limit_hit);
        let alert = outcome.alert.unwrap();
        assert_eq!(alert.kind.as_deref(), Some("exceed_and_expression_search_limit"));
    }
}
