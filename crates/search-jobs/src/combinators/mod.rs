//! Jobs defined in terms of one or more child jobs.
//!
//! Construction goes through the smart constructors on
//! [`Job`](crate::Job); the structs here only carry parameters and `run`.

mod alert;
mod and;
mod filter;
mod limit;
mod or;
mod parallel;
mod priority;
mod sanitize;
mod select;
mod sequential;
mod timeout;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use search_protocol::{Clients, ErrorSet, JobContext, JobError, MaxAlerter, Outcome, SharedSender};

use crate::job::Job;

pub use alert::AlertJob;
pub use and::AndJob;
pub use filter::{apply_sub_repo_filtering, SubRepoPermsFilterJob};
pub use limit::LimitJob;
pub use or::OrJob;
pub use parallel::ParallelJob;
pub use priority::{PriorityJob, DEFAULT_PRIORITY_GRACE};
pub use sanitize::SanitizeJob;
pub use select::SelectJob;
pub use sequential::SequentialJob;
pub use timeout::TimeoutJob;

/// Default cap on simultaneously running And/Or children.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Run every child as its own task and wait for all of them.
///
/// `sender_for(i)` supplies the sender for child `i`. With `max_concurrency`
/// set, at most that many children run at once. Errors never cancel
/// siblings. A child task that panics is reported as
/// [`JobError::TaskFailed`]; dropping the returned future aborts every task.
pub(crate) async fn run_concurrently(
    job: &'static str,
    children: &[Job],
    ctx: &JobContext,
    clients: &Clients,
    max_concurrency: Option<usize>,
    sender_for: impl Fn(usize) -> SharedSender,
) -> Vec<Outcome> {
    let semaphore = max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let mut tasks = JoinSet::new();

    for (idx, child) in children.iter().enumerate() {
        let child = child.clone();
        let ctx = ctx.clone();
        let clients = clients.clone();
        let sender = sender_for(idx);
        let semaphore = semaphore.clone();

        tasks.spawn(
            async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                child.run(&ctx, &clients, sender).await
            }
            .in_current_span(),
        );
    }

    let mut outcomes = Vec::with_capacity(children.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.unwrap_or_else(|err| task_failed(job, err)));
    }
    outcomes
}

pub(crate) fn task_failed(job: &str, err: JoinError) -> Outcome {
    tracing::error!(job, error = %err, "child task failed");
    Outcome::failed(JobError::TaskFailed {
        job: job.to_string(),
        detail: err.to_string(),
    })
}

/// Max-priority alert and aggregated error of `outcomes`.
pub(crate) fn merge_outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
    let mut alerts = MaxAlerter::default();
    let mut errors = ErrorSet::default();
    for outcome in outcomes {
        outcome.record(&mut alerts, &mut errors);
    }
    Outcome::new(alerts.into_alert(), errors.into_error())
}
