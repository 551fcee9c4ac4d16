use search_protocol::{Clients, JobContext, Outcome, SelectPath, SharedSender};

use crate::job::Job;
use crate::streaming::SelectSender;

/// Projects its child's matches onto a `select:` path.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectJob {
    pub(crate) path: SelectPath,
    pub(crate) child: Box<Job>,
}

impl SelectJob {
    pub fn path(&self) -> &SelectPath {
        &self.path
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let selecting = SelectSender::wrap(sender, self.path.clone());
        self.child.run(ctx, clients, selecting).await
    }
}
