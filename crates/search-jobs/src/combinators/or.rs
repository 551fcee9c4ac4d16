use std::sync::Arc;

use search_protocol::{sender_fn, Clients, JobContext, JobError, Outcome, SearchEvent, SharedSender};

use super::{merge_outcomes, run_concurrently, DEFAULT_MAX_CONCURRENCY};
use crate::job::Job;
use crate::streaming::Merger;

/// Union with a fairness flush.
///
/// While children run, a match is forwarded as soon as every child has
/// reported it. Once all children are done, every match reported by only
/// some of them is forwarded exactly once, ordered by match identity. The
/// flush happens even when children failed. While the Or's own context is
/// live, cancellation errors from children are not reported; once the caller
/// has canceled, they are.
#[derive(Debug, Clone, PartialEq)]
pub struct OrJob {
    pub(crate) children: Vec<Job>,
    pub(crate) max_concurrency: usize,
}

impl OrJob {
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

        let outcomes = run_concurrently(
            "or",
            &self.children,
            ctx,
            clients,
            Some(self.max_concurrency),
            |idx| {
                let parent = Arc::clone(&sender);
                let merger = Arc::clone(&merger);
                sender_fn(move |mut event: SearchEvent| {
                    event.results = merger.add_matches(event.results, idx);
                    parent.send(event);
                })
            },
        )
        .await;

        let caller_stopped = ctx.err().is_some();
        let outcome = merge_outcomes(outcomes.into_iter().map(|mut outcome| {
            if !caller_stopped {
                outcome.error = outcome.error.and_then(JobError::without_cancellation);
            }
            outcome
        }));

        let unsent = merger.unsent_tracked();
        if !unsent.is_empty() {
            tracing::debug!(count = unsent.len(), "flushing partial or-matches");
            sender.send(SearchEvent::from_results(unsent));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{self, StaticLeaf};
    use search_protocol::{fakes as protocol_fakes, AggregatingSender};

    #[tokio::test]
    async fn test_or_forwards_union_once() {
        let job = Job::or(vec![
            Job::leaf(StaticLeaf::new("a", vec![fakes::repo_event(&[1, 2])])),
            Job::leaf(StaticLeaf::new("b", vec![fakes::repo_event(&[2, 3])])),
        ]);
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;

        assert!(outcome.is_ok());
        let mut ids: Vec<_> = agg.results().iter().map(|m| m.repo().id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_or_flushes_even_when_a_child_fails() {
        let job = Job::or(vec![
            Job::leaf(StaticLeaf::new("a", vec![fakes::repo_event(&[1])])),
            Job::leaf(StaticLeaf::new("b", vec![]).failing("backend down")),
        ]);
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;

        assert_eq!(agg.result_count(), 1);
        assert!(outcome.error.unwrap().to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_or_reports_caller_cancellation() {
        let ctx = JobContext::default();
        ctx.cancel();
        let job = Job::or(vec![
            Job::leaf(StaticLeaf::new("a", vec![fakes::repo_event(&[1])])),
            Job::leaf(StaticLeaf::new("b", vec![fakes::repo_event(&[2])])),
        ]);
        let outcome = job
            .run(&ctx, &protocol_fakes::clients(), AggregatingSender::new())
            .await;
        assert!(outcome.error.is_some_and(|err| err.is_cancelled()));
    }

    #[tokio::test]
    async fn test_or_hides_cancellation_of_a_limited_child() {
        let job = Job::or(vec![
            Job::limit(
                1,
                Job::leaf(StaticLeaf::new("a", vec![fakes::repo_event(&[1, 3])]).then_wait()),
            ),
            Job::leaf(StaticLeaf::new("b", vec![fakes::repo_event(&[2])])),
        ]);
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;
        assert!(outcome.is_ok());
        assert_eq!(agg.result_count(), 2);
    }
}
