//! Repository pagination.
//!
//! A [`RepoPagerJob`] asks the resolver for pages of repositories, splits each
//! page into index-backed and unindexed repositories, binds its template to
//! that split and runs the result. Pages are processed one at a time; the
//! first error ends pagination and is returned.

use std::sync::Arc;

use futures::StreamExt;

use search_protocol::{
    Clients, JobContext, JobError, MaxAlerter, Outcome, RepoOptions, ResolvedRepos, SearchEvent,
    SharedSender,
};

use crate::job::{Job, LeafHandle};
use crate::mapper::Mapper;
use crate::metrics::METRICS;
use crate::obs;

/// A job template that needs data resolved at run time before it can run.
pub trait PartialJob<T>: Send + Sync {
    fn resolve(&self, data: T) -> Job;
}

/// A template whose leaves search repositories.
///
/// Resolving it hands the resolved repositories to every leaf that accepts
/// them (see [`LeafJob::resolve_repos`](crate::LeafJob::resolve_repos)).
/// Other leaves and every combinator are copied unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ReposPartialJob {
    template: Box<Job>,
}

impl ReposPartialJob {
    pub fn new(template: Job) -> Self {
        Self {
            template: Box::new(template),
        }
    }

    pub fn template(&self) -> &Job {
        &self.template
    }
}

impl<'r> PartialJob<&'r ResolvedRepos> for ReposPartialJob {
    fn resolve(&self, repos: &'r ResolvedRepos) -> Job {
        Mapper::new()
            .on_leaves(|job| {
                let resolved = match &job {
                    Job::Leaf(leaf) => leaf.get().resolve_repos(repos),
                    _ => None,
                };
                resolved.map_or(job, |leaf| Job::Leaf(LeafHandle::from(leaf)))
            })
            .map(&self.template)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepoPagerJob {
    repo_opts: RepoOptions,
    contains_ref_globs: bool,
    skip_partitioning: bool,
    child: ReposPartialJob,
}

impl RepoPagerJob {
    pub fn new(repo_opts: RepoOptions, template: Job) -> Self {
        Self {
            repo_opts,
            contains_ref_globs: false,
            skip_partitioning: false,
            child: ReposPartialJob::new(template),
        }
    }

    /// Tell the partitioner that revisions contain ref globs.
    pub fn with_ref_globs(mut self, contains_ref_globs: bool) -> Self {
        self.contains_ref_globs = contains_ref_globs;
        self
    }

    /// Treat every repository as unindexed without asking the partitioner.
    pub fn skip_partitioning(mut self) -> Self {
        self.skip_partitioning = true;
        self
    }

    pub fn repo_opts(&self) -> &RepoOptions {
        &self.repo_opts
    }

    pub fn child(&self) -> &ReposPartialJob {
        &self.child
    }

    pub(crate) fn with_template(&self, template: Job) -> Self {
        Self {
            repo_opts: self.repo_opts.clone(),
            contains_ref_globs: self.contains_ref_globs,
            skip_partitioning: self.skip_partitioning,
            child: ReposPartialJob::new(template),
        }
    }

    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let mut alerts = MaxAlerter::default();
        let mut pages = clients.resolver.paginate(ctx, &self.repo_opts);
        let mut page_no = 0;

        while let Some(page) = pages.next().await {
            if let Err(err) = ctx.check() {
                return Outcome::new(alerts.into_alert(), Some(err));
            }
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(page = page_no, error = %err, "repository pagination failed");
                    return Outcome::new(alerts.into_alert(), Some(JobError::Resolver(err)));
                }
            };

            if let Some(stats) = page.stats() {
                sender.send(SearchEvent::from_stats(stats));
            }

            let repos = if self.skip_partitioning {
                ResolvedRepos::unpartitioned(page.repo_revs)
            } else {
                let partitioned = clients
                    .resolver
                    .partition(
                        ctx,
                        &page.repo_revs,
                        self.repo_opts.use_index,
                        self.contains_ref_globs,
                    )
                    .await;
                match partitioned {
                    Ok(repos) => repos,
                    Err(err) => {
                        tracing::warn!(page = page_no, error = %err, "repository partitioning failed");
                        return Outcome::new(alerts.into_alert(), Some(JobError::Resolver(err)));
                    }
                }
            };

            METRICS.inc_pages_resolved();
            obs::emit_page_resolved(page_no, repos.indexed.len(), repos.unindexed.len());

            let job = self.child.resolve(&repos);
            let outcome = job.run(ctx, clients, Arc::clone(&sender)).await;
            alerts.add(outcome.alert);
            if let Some(err) = outcome.error {
                return Outcome::new(alerts.into_alert(), Some(err));
            }
            page_no += 1;
        }

        Outcome::new(alerts.into_alert(), None)
    }
}
