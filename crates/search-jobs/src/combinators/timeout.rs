use std::time::Duration;

use search_protocol::{Clients, JobContext, Outcome, SharedSender};

use crate::job::Job;

/// Runs its child under a deadline. Reaching the deadline is reported by the
/// child as [`JobError::DeadlineExceeded`](search_protocol::JobError) and is
/// left for an enclosing alert job to explain.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutJob {
    pub(crate) timeout: Duration,
    pub(crate) child: Box<Job>,
}

impl TimeoutJob {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let (ctx, _guard) = ctx.with_timeout(self.timeout);
        self.child.run(&ctx, clients, sender).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::BlockingLeaf;
    use search_protocol::{fakes as protocol_fakes, AggregatingSender, JobError};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_deadline_from_child() {
        let job = Job::timeout(
            Duration::from_millis(250),
            Job::leaf(BlockingLeaf::new("slow")),
        );
        let start = tokio::time::Instant::now();
        let outcome = job
            .run(
                &JobContext::default(),
                &protocol_fakes::clients(),
                AggregatingSender::new(),
            )
            .await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
        assert!(matches!(outcome.error, Some(JobError::DeadlineExceeded)));
    }
}
