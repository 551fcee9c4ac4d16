use std::sync::Arc;

use tokio::time::Instant;

use search_protocol::{
    suggest_longer_timeout, Alert, Clients, JobContext, JobError, Outcome, RepoStatus,
    SearchInputs, SharedSender,
};

use crate::job::Job;
use crate::metrics::METRICS;
use crate::obs;
use crate::streaming::{CountingSender, StatsObservingSender};

/// Root of a query's job tree: turns the child's result into user-facing
/// alerts.
///
/// A deadline is explained with a timeout alert unless some repository was
/// already reported as timed out, in which case the progress statistics
/// carry that information and the deadline is dropped silently.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertJob {
    pub(crate) inputs: SearchInputs,
    pub(crate) child: Box<Job>,
}

impl AlertJob {
    pub fn inputs(&self) -> &SearchInputs {
        &self.inputs
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let start = Instant::now();
        let counting = CountingSender::new(sender);
        let observing = StatsObservingSender::new(Arc::clone(&counting) as SharedSender);

        let outcome = self
            .child
            .run(ctx, clients, Arc::clone(&observing) as SharedSender)
            .await;

        let verdict = clients
            .alert_observer
            .observe(ctx, &self.inputs, counting.count() > 0, outcome.error)
            .await;

        let timed_out = verdict
            .error
            .as_ref()
            .is_some_and(JobError::is_deadline_exceeded);
        let result = if !timed_out {
            Outcome::new(Alert::max_priority(outcome.alert, verdict.alert), verdict.error)
        } else if observing.stats().status.any(RepoStatus::TIMEDOUT) {
            Outcome::new(
                Alert::max_priority(outcome.alert, verdict.alert),
                verdict.error.and_then(JobError::without_deadline),
            )
        } else {
            let used = start.elapsed();
            let alert = Alert::for_timeout(
                used,
                suggest_longer_timeout(used),
                &self.inputs.original_query,
            );
            Outcome::new(Some(alert), verdict.error.and_then(JobError::without_deadline))
        };

        if let Some(alert) = &result.alert {
            METRICS.inc_alerts_raised();
            obs::emit_alert_raised(alert);
        }
        result
    }
}
