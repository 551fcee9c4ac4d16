use std::sync::Arc;

use search_protocol::{Clients, JobContext, JobError, Outcome, SharedSender};

use crate::job::Job;
use crate::streaming::LimitSender;

/// Caps the number of results its child may send.
///
/// When the cap is crossed the child's context is canceled; the resulting
/// cancellation is expected and is not reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitJob {
    pub(crate) limit: usize,
    pub(crate) child: Box<Job>,
}

impl LimitJob {
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let (child_ctx, _guard) = ctx.with_cancel();
        let limiter = LimitSender::new(sender, self.limit, child_ctx.clone());
        let mut outcome = self
            .child
            .run(&child_ctx, clients, Arc::clone(&limiter) as SharedSender)
            .await;
        if limiter.limit_hit() {
            outcome.error = outcome.error.and_then(JobError::without_cancellation);
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
    async fn test_limit_hides_its_own_cancellation() {
        let events = (0..10).map(|i| fakes::repo_event(&[i])).collect();
        let job = Job::limit(3, Job::leaf(StaticLeaf::new("zoekt", events)));
        let agg = AggregatingSender::new();
        let outcome = job
            .run(&JobContext::default(), &protocol_fakes::clients(), agg.clone())
            .await;

        assert!(outcome.is_ok());
        assert_eq!(agg.result_count(), 3);
        assert!(agg.stats().is_limit_hit);
    }

    #[tokio::test]
    async fn test_limit_keeps_cancellation_it_did_not_cause() {
        let ctx = JobContext::default();
        ctx.cancel();
        let job = Job::limit(3, Job::leaf(StaticLeaf::new("zoekt", vec![])));
        let outcome = job
            .run(&ctx, &protocol_fakes::clients(), AggregatingSender::new())
            .await;
        assert!(matches!(outcome.error, Some(JobError::Cancelled)));
    }
}
