use std::sync::Arc;

use search_protocol::{Clients, ErrorSet, JobContext, JobError, MaxAlerter, Outcome, SharedSender};

use crate::job::Job;
use crate::streaming::DedupSender;

/// Runs children one at a time, in order.
///
/// Stops without running the remaining children as soon as the context is
/// found stopped after a child returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialJob {
    pub(crate) ensure_unique: bool,
    pub(crate) children: Vec<Job>,
}

impl SequentialJob {
    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let sender = if self.ensure_unique {
            DedupSender::wrap(sender)
        } else {
            sender
        };

        let mut alerts = MaxAlerter::default();
        let mut errors = ErrorSet::default();
        for (idx, child) in self.children.iter().enumerate() {
            let outcome = child.run(ctx, clients, Arc::clone(&sender)).await;
            if let Some(stopped) = ctx.err() {
                tracing::debug!(
                    ran = idx + 1,
                    skipped = self.children.len() - idx - 1,
                    reason = %stopped,
                    "sequential job stopping early"
                );
                alerts.add(outcome.alert);
                errors.extend(
                    outcome
                        .error
                        .and_then(JobError::without_cancellation)
                        .and_then(JobError::without_deadline),
                );
                errors.push(stopped.into());
                break;
            }
            outcome.record(&mut alerts, &mut errors);
        }
        Outcome::new(alerts.into_alert(), errors.into_error())
    }
}
