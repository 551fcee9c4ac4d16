//! Running a job tree as one query.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use search_protocol::{Clients, JobContext, Outcome, SharedSender};

use crate::job::Job;
use crate::metrics::METRICS;
use crate::obs;
use crate::streaming::CountingSender;

/// Run `job` as a query: under a fresh query span, logging its start and
/// finish and flushing the counters when it returns.
pub async fn execute(job: &Job, ctx: &JobContext, clients: &Clients, sender: SharedSender) -> Outcome {
    let query_id = obs::new_query_id();
    let span = obs::query_span(&query_id);

    async {
        let started = Instant::now();
        obs::emit_query_started(&query_id, job.name());

        let counter = CountingSender::new(sender);
        let outcome = job.run(ctx, clients, Arc::clone(&counter) as SharedSender).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        obs::emit_query_finished(&query_id, duration_ms, counter.count(), outcome.is_ok());
        METRICS.flush();
        outcome
    }
    .instrument(span)
    .await
}
