use std::sync::Arc;

use search_protocol::{Clients, JobContext, Outcome, SharedSender};

use super::{merge_outcomes, run_concurrently};
use crate::job::Job;

/// Runs every child concurrently against the same sender.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelJob {
    pub(crate) children: Vec<Job>,
}

impl ParallelJob {
    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let outcomes = run_concurrently("parallel", &self.children, ctx, clients, None, |_| {
            Arc::clone(&sender)
        })
        .await;
        merge_outcomes(outcomes)
    }
}
