//! The job tree.
//!
//! [`Job`] is a closed set of combinators plus opaque [`LeafJob`]s supplied by
//! backends. Every variant answers two capabilities: `run` and tree access
//! (`children` / `map_children`). Jobs are immutable once built; all
//! bookkeeping a combinator needs is created fresh inside each `run` call, so
//! the same tree can be cloned, rewritten and run again safely.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use tracing::Instrument;

use search_protocol::{
    Alert, Clients, JobContext, JobResult, Outcome, ResolvedRepos, SearchInputs, SelectPath,
    SharedSender,
};

use crate::combinators::{
    AlertJob, AndJob, LimitJob, OrJob, ParallelJob, PriorityJob, SanitizeJob, SelectJob,
    SequentialJob, SubRepoPermsFilterJob, TimeoutJob,
};
use crate::metrics::METRICS;
use crate::repo_pager::RepoPagerJob;

// ---------------------------------------------------------------------------
// Leaf jobs
// ---------------------------------------------------------------------------

/// A job that talks to a concrete backend.
///
/// The engine treats leaves as opaque: it runs them, passes them the
/// [`Clients`] bundle, and hands them resolved repositories when they sit
/// inside a [`RepoPagerJob`] template.
#[async_trait]
pub trait LeafJob: Send + Sync {
    /// Stable name used for logging and for tree rewrites keyed by leaf.
    fn name(&self) -> &'static str;

    /// Stream results into `sender` until done or `ctx` is canceled. A leaf
    /// started on an already canceled context must return promptly with the
    /// context's error.
    async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> JobResult<Option<Alert>>;

    /// A copy of this leaf bound to `repos`, or `None` if the leaf does not
    /// search repositories.
    fn resolve_repos(&self, _repos: &ResolvedRepos) -> Option<Arc<dyn LeafJob>> {
        None
    }
}

/// Shared handle to a leaf. Two handles are equal when they point at the
/// same leaf value.
#[derive(Clone)]
pub struct LeafHandle(Arc<dyn LeafJob>);

impl LeafHandle {
    pub fn new(leaf: impl LeafJob + 'static) -> Self {
        Self(Arc::new(leaf))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn get(&self) -> &dyn LeafJob {
        self.0.as_ref()
    }
}

impl From<Arc<dyn LeafJob>> for LeafHandle {
    fn from(leaf: Arc<dyn LeafJob>) -> Self {
        Self(leaf)
    }
}

impl PartialEq for LeafHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for LeafHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Leaf").field(&self.0.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// The variant of a job, used to key tree rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Parallel,
    Sequential,
    And,
    Or,
    Priority,
    Timeout,
    Limit,
    Select,
    SubRepoPermsFilter,
    Sanitize,
    Alert,
    Noop,
    RepoPager,
    Leaf(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Job {
    Parallel(ParallelJob),
    Sequential(SequentialJob),
    And(AndJob),
    Or(OrJob),
    Priority(PriorityJob),
    Timeout(TimeoutJob),
    Limit(LimitJob),
    Select(SelectJob),
    SubRepoPermsFilter(SubRepoPermsFilterJob),
    Sanitize(SanitizeJob),
    Alert(AlertJob),
    #[default]
    Noop,
    RepoPager(RepoPagerJob),
    Leaf(LeafHandle),
}

/// 0 children is a no-op, 1 child is that child, otherwise `build`.
fn collapse(mut children: Vec<Job>, build: impl FnOnce(Vec<Job>) -> Job) -> Job {
    if children.len() <= 1 {
        return children.pop().unwrap_or_default();
    }
    build(children)
}

impl Job {
    pub fn noop() -> Job {
        Job::Noop
    }

    pub fn leaf(leaf: impl LeafJob + 'static) -> Job {
        Job::Leaf(LeafHandle::new(leaf))
    }

    /// Run `children` concurrently against one sender.
    pub fn parallel(children: Vec<Job>) -> Job {
        collapse(children, |children| Job::Parallel(ParallelJob { children }))
    }

    /// Run `children` one after another, optionally dropping matches an
    /// earlier child already sent.
    pub fn sequential(ensure_unique: bool, children: Vec<Job>) -> Job {
        collapse(children, |children| {
            Job::Sequential(SequentialJob {
                ensure_unique,
                children,
            })
        })
    }

    /// Forward only matches every child reports.
    pub fn and(children: Vec<Job>) -> Job {
        collapse(children, |children| Job::And(AndJob::new(children)))
    }

    /// Forward matches every child reports as they arrive, and the rest once
    /// all children are done.
    pub fn or(children: Vec<Job>) -> Job {
        collapse(children, |children| Job::Or(OrJob::new(children)))
    }

    /// Run `optional` alongside `required`, giving it a short grace window
    /// after `required` finishes.
    pub fn priority(required: Job, optional: Job) -> Job {
        if optional.is_noop() {
            return required;
        }
        Job::Priority(PriorityJob::new(required, optional))
    }

    pub fn timeout(timeout: Duration, child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::Timeout(TimeoutJob {
            timeout,
            child: Box::new(child),
        })
    }

    pub fn limit(limit: usize, child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::Limit(LimitJob {
            limit,
            child: Box::new(child),
        })
    }

    pub fn select(path: SelectPath, child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::Select(SelectJob {
            path,
            child: Box::new(child),
        })
    }

    pub fn sub_repo_perms_filter(child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::SubRepoPermsFilter(SubRepoPermsFilterJob {
            child: Box::new(child),
        })
    }

    pub fn sanitize(patterns: Vec<Regex>, child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::Sanitize(SanitizeJob {
            patterns,
            child: Box::new(child),
        })
    }

    pub fn alert(inputs: SearchInputs, child: Job) -> Job {
        if child.is_noop() {
            return child;
        }
        Job::Alert(AlertJob {
            inputs,
            child: Box::new(child),
        })
    }

    pub fn repo_pager(pager: RepoPagerJob) -> Job {
        Job::RepoPager(pager)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Job::Noop)
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::Parallel(_) => JobKind::Parallel,
            Job::Sequential(_) => JobKind::Sequential,
            Job::And(_) => JobKind::And,
            Job::Or(_) => JobKind::Or,
            Job::Priority(_) => JobKind::Priority,
            Job::Timeout(_) => JobKind::Timeout,
            Job::Limit(_) => JobKind::Limit,
            Job::Select(_) => JobKind::Select,
            Job::SubRepoPermsFilter(_) => JobKind::SubRepoPermsFilter,
            Job::Sanitize(_) => JobKind::Sanitize,
            Job::Alert(_) => JobKind::Alert,
            Job::Noop => JobKind::Noop,
            Job::RepoPager(_) => JobKind::RepoPager,
            Job::Leaf(leaf) => JobKind::Leaf(leaf.name()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Job::Parallel(_) => "parallel",
            Job::Sequential(_) => "sequential",
            Job::And(_) => "and",
            Job::Or(_) => "or",
            Job::Priority(_) => "priority",
            Job::Timeout(_) => "timeout",
            Job::Limit(_) => "limit",
            Job::Select(_) => "select",
            Job::SubRepoPermsFilter(_) => "sub_repo_perms_filter",
            Job::Sanitize(_) => "sanitize",
            Job::Alert(_) => "alert",
            Job::Noop => "noop",
            Job::RepoPager(_) => "repo_pager",
            Job::Leaf(leaf) => leaf.name(),
        }
    }

    /// Run this job to completion.
    ///
    /// Once the returned future resolves the job has stopped sending.
    pub fn run<'a>(
        &'a self,
        ctx: &'a JobContext,
        clients: &'a Clients,
        sender: SharedSender,
    ) -> BoxFuture<'a, Outcome> {
        let span = tracing::debug_span!("search.job", job = self.name());
        async move {
            METRICS.inc_jobs_started();
            let outcome = match self {
                Job::Parallel(job) => job.run(ctx, clients, sender).await,
                Job::Sequential(job) => job.run(ctx, clients, sender).await,
                Job::And(job) => job.run(ctx, clients, sender).await,
                Job::Or(job) => job.run(ctx, clients, sender).await,
                Job::Priority(job) => job.run(ctx, clients, sender).await,
                Job::Timeout(job) => job.run(ctx, clients, sender).await,
                Job::Limit(job) => job.run(ctx, clients, sender).await,
                Job::Select(job) => job.run(ctx, clients, sender).await,
                Job::SubRepoPermsFilter(job) => job.run(ctx, clients, sender).await,
                Job::Sanitize(job) => job.run(ctx, clients, sender).await,
                Job::Alert(job) => job.run(ctx, clients, sender).await,
                Job::Noop => Outcome::ok(),
                Job::RepoPager(job) => job.run(ctx, clients, sender).await,
                Job::Leaf(leaf) => Outcome::from(leaf.get().run(ctx, clients, sender).await),
            };
            if let Some(err) = &outcome.error {
                tracing::debug!(error = %err, "job finished with error");
            }
            outcome
        }
        .instrument(span)
        .boxed()
    }

    /// Direct children, in execution order. A repo pager's child is its
    /// unresolved template.
    pub fn children(&self) -> Vec<&Job> {
        match self {
            Job::Parallel(job) => job.children.iter().collect(),
            Job::Sequential(job) => job.children.iter().collect(),
            Job::And(job) => job.children.iter().collect(),
            Job::Or(job) => job.children.iter().collect(),
            Job::Priority(job) => vec![job.required.as_ref(), job.optional.as_ref()],
            Job::Timeout(job) => vec![job.child.as_ref()],
            Job::Limit(job) => vec![job.child.as_ref()],
            Job::Select(job) => vec![job.child.as_ref()],
            Job::SubRepoPermsFilter(job) => vec![job.child.as_ref()],
            Job::Sanitize(job) => vec![job.child.as_ref()],
            Job::Alert(job) => vec![job.child.as_ref()],
            Job::RepoPager(job) => vec![job.child().template()],
            Job::Noop | Job::Leaf(_) => Vec::new(),
        }
    }

    /// A copy of this job with every direct child replaced by `f(child)`.
    ///
    /// The node itself keeps its variant and parameters; no collapsing is
    /// applied, so the shape of the tree is preserved.
    pub fn map_children(&self, mut f: impl FnMut(&Job) -> Job) -> Job {
        let mut map_box = |child: &Job| Box::new(f(child));
        match self {
            Job::Parallel(job) => Job::Parallel(ParallelJob {
                children: job.children.iter().map(|c| *map_box(c)).collect(),
            }),
            Job::Sequential(job) => Job::Sequential(SequentialJob {
                ensure_unique: job.ensure_unique,
                children: job.children.iter().map(|c| *map_box(c)).collect(),
            }),
            Job::And(job) => Job::And(AndJob {
                children: job.children.iter().map(|c| *map_box(c)).collect(),
                max_concurrency: job.max_concurrency,
            }),
            Job::Or(job) => Job::Or(OrJob {
                children: job.children.iter().map(|c| *map_box(c)).collect(),
                max_concurrency: job.max_concurrency,
            }),
            Job::Priority(job) => Job::Priority(PriorityJob {
                required: map_box(&job.required),
                optional: map_box(&job.optional),
                grace: job.grace,
            }),
            Job::Timeout(job) => Job::Timeout(TimeoutJob {
                timeout: job.timeout,
                child: map_box(&job.child),
            }),
            Job::Limit(job) => Job::Limit(LimitJob {
                limit: job.limit,
                child: map_box(&job.child),
            }),
            Job::Select(job) => Job::Select(SelectJob {
                path: job.path.clone(),
                child: map_box(&job.child),
            }),
            Job::SubRepoPermsFilter(job) => Job::SubRepoPermsFilter(SubRepoPermsFilterJob {
                child: map_box(&job.child),
            }),
            Job::Sanitize(job) => Job::Sanitize(SanitizeJob {
                patterns: job.patterns.clone(),
                child: map_box(&job.child),
            }),
            Job::Alert(job) => Job::Alert(AlertJob {
                inputs: job.inputs.clone(),
                child: map_box(&job.child),
            }),
            Job::RepoPager(job) => Job::RepoPager(job.with_template(*map_box(job.child().template()))),
            Job::Noop => Job::Noop,
            Job::Leaf(leaf) => Job::Leaf(leaf.clone()),
        }
    }

    /// Visit this job and every descendant, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&Job)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// True if this job or any descendant satisfies `pred`.
    pub fn has_descendant(&self, pred: impl Fn(&Job) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |job| found |= pred(job));
        found
    }

    /// Override the And/Or concurrency cap of this node. Other variants are
    /// returned unchanged.
    pub fn with_max_concurrency(self, max_concurrency: usize) -> Job {
        match self {
            Job::And(job) => Job::And(AndJob {
                max_concurrency,
                ..job
            }),
            Job::Or(job) => Job::Or(OrJob {
                max_concurrency,
                ..job
            }),
            other => other,
        }
    }

    /// Override the grace window of a Priority node. Other variants are
    /// returned unchanged.
    pub fn with_priority_grace(self, grace: Duration) -> Job {
        match self {
            Job::Priority(job) => Job::Priority(PriorityJob { grace, ..job }),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticLeaf;

    #[test]
    fn test_parallel_collapses_zero_and_one_child() {
        assert_eq!(Job::parallel(vec![]), Job::Noop);
        let leaf = Job::leaf(StaticLeaf::new("zoekt", vec![]));
        assert_eq!(Job::parallel(vec![leaf.clone()]), leaf);
        assert_eq!(Job::and(vec![leaf.clone()]), leaf);
        assert_eq!(Job::or(vec![]), Job::Noop);
        assert_eq!(Job::sequential(true, vec![leaf.clone()]), leaf);
    }

    #[test]
    fn test_priority_with_noop_optional_is_required() {
        let leaf = Job::leaf(StaticLeaf::new("zoekt", vec![]));
        assert_eq!(Job::priority(leaf.clone(), Job::noop()), leaf);
    }

    #[test]
    fn test_wrappers_around_noop_collapse() {
        assert!(Job::limit(5, Job::noop()).is_noop());
        assert!(Job::timeout(Duration::from_secs(1), Job::noop()).is_noop());
        assert!(Job::select(SelectPath::Repository, Job::noop()).is_noop());
    }

    #[test]
    fn test_leaf_equality_is_identity() {
        let a = Job::leaf(StaticLeaf::new("zoekt", vec![]));
        let b = Job::leaf(StaticLeaf::new("zoekt", vec![]));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_children_and_map_children_preserve_shape() {
        let a = Job::leaf(StaticLeaf::new("a", vec![]));
        let b = Job::leaf(StaticLeaf::new("b", vec![]));
        let tree = Job::limit(10, Job::parallel(vec![a, b]));

        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].children().len(), 2);

        let copy = tree.map_children(|child| child.clone());
        assert_eq!(copy, tree);
    }

    #[test]
    fn test_has_descendant_includes_self() {
        let leaf = Job::leaf(StaticLeaf::new("searcher", vec![]));
        let tree = Job::timeout(Duration::from_secs(1), leaf);
        assert!(tree.has_descendant(|j| j.kind() == JobKind::Timeout));
        assert!(tree.has_descendant(|j| j.kind() == JobKind::Leaf("searcher")));
        assert!(!tree.has_descendant(|j| j.kind() == JobKind::Limit));
    }

    #[test]
    fn test_walk_visits_parents_first() {
        let a = Job::leaf(StaticLeaf::new("a", vec![]));
        let b = Job::leaf(StaticLeaf::new("b", vec![]));
        let tree = Job::sequential(false, vec![a, b]);
        let mut names = Vec::new();
        tree.walk(&mut |job| names.push(job.name()));
        assert_eq!(names, vec!["sequential", "a", "b"]);
    }
}
