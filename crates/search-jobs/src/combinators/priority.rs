use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::Instrument;

use search_protocol::{Clients, JobContext, Outcome, SharedSender};

use super::{merge_outcomes, task_failed};
use crate::job::Job;

/// Default time `optional` may keep running after `required` finished.
pub const DEFAULT_PRIORITY_GRACE: Duration = Duration::from_millis(100);

/// Runs `required` and `optional` concurrently. Once `required` finishes,
/// `optional` gets a grace window before it is canceled; the job returns
/// after both have stopped. Alerts and errors of both branches are
/// reported, including the cancellation of `optional`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityJob {
    pub(crate) required: Box<Job>,
    pub(crate) optional: Box<Job>,
    pub(crate) grace: Duration,
}

impl PriorityJob {
    pub(crate) fn new(required: Job, optional: Job) -> Self {
        Self {
            required: Box::new(required),
            optional: Box::new(optional),
            grace: DEFAULT_PRIORITY_GRACE,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let (optional_ctx, _optional_guard) = ctx.with_cancel();
        // Dropping the set aborts the optional branch along with this job.
        let mut optional = JoinSet::new();
        {
            let job = (*self.optional).clone();
            let ctx = optional_ctx.clone();
            let clients = clients.clone();
            let sender = Arc::clone(&sender);
            optional.spawn(
                async move { job.run(&ctx, &clients, sender).await }.in_current_span(),
            );
        }

        let required = self.required.run(ctx, clients, sender).await;

        let joined = tokio::select! {
            joined = optional.join_next() => joined,
            _ = tokio::time::sleep(self.grace) => {
                tracing::debug!(
                    grace_ms = self.grace.as_millis() as u64,
                    "optional branch outlived grace window, canceling"
                );
                optional_ctx.cancel();
                optional.join_next().await
            }
        };
        let optional = match joined {
            Some(Ok(outcome)) => outcome,
            Some(Err(err)) => task_failed("priority", err),
            None => Outcome::ok(),
        };

        merge_outcomes([required, optional])
    }
}
