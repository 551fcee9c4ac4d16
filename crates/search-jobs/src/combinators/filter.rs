use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use search_protocol::{
    actor_permissions, can_read_any_path, sender_fn, Actor, Clients, ErrorSet, JobContext,
    JobError, Match, Outcome, Perms, RepoContent, RepoName, SearchEvent, SharedSender,
    SubRepoPermsChecker,
};

use crate::job::Job;
use crate::metrics::METRICS;
use crate::obs;

/// Drops matches the acting user may not read under sub-repo permissions.
///
/// Permission lookup failures drop the affected matches and are logged; the
/// job then reports a single generic error that does not name any path.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRepoPermsFilterJob {
    pub(crate) child: Box<Job>,
}

impl SubRepoPermsFilterJob {
    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let failed = Arc::new(AtomicBool::new(false));
        let filtering = {
            let checker = Arc::clone(&clients.perms_checker);
            let actor = ctx.actor().clone();
            let failed = Arc::clone(&failed);
            sender_fn(move |mut event: SearchEvent| {
                let before = event.results.len();
                let (kept, errors) = apply_sub_repo_filtering(checker.as_ref(), &actor, event.results);
                METRICS.add_matches_filtered((before - kept.len()) as u64);
                if !errors.is_empty() {
                    obs::emit_sub_repo_filter_failed(&errors);
                    failed.store(true, Ordering::SeqCst);
                }
                event.results = kept;
                sender.send(event);
            })
        };

        let mut outcome = self.child.run(ctx, clients, filtering).await;
        if failed.load(Ordering::SeqCst) {
            let mut errors = ErrorSet::default();
            errors.push(JobError::SubRepoPermsFilter);
            errors.extend(outcome.error.take());
            outcome.error = errors.into_error();
        }
        outcome
    }
}

/// Keep the matches `actor` may read, collecting lookup failures.
///
/// Once a lookup for a repository fails, later matches from that repository
/// in the same batch are dropped without asking again.
pub fn apply_sub_repo_filtering(
    checker: &dyn SubRepoPermsChecker,
    actor: &Actor,
    matches: Vec<Match>,
) -> (Vec<Match>, Vec<anyhow::Error>) {
    if !checker.enabled() || actor.internal {
        return (matches, Vec::new());
    }

    let mut errored: HashSet<RepoName> = HashSet::new();
    let mut errors = Vec::new();
    let mut kept = Vec::with_capacity(matches.len());

    for m in matches {
        let repo = m.repo().name.clone();
        if errored.contains(&repo) {
            continue;
        }
        let allowed = match &m {
            Match::File(fm) => {
                let content = RepoContent {
                    repo: repo.clone(),
                    path: fm.path.clone(),
                };
                actor_permissions(checker, actor, &content).map(|perms| perms == Perms::Read)
            }
            Match::Commit(cm) => can_read_any_path(checker, actor, &repo, &cm.modified_files),
            Match::Repo(_) => Ok(true),
        };
        match allowed {
            Ok(true) => kept.push(m),
            Ok(false) => {}
            Err(err) => {
                errors.push(err);
                errored.insert(repo);
            }
        }
    }
    (kept, errors)
}
