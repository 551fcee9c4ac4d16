//! Collaborator contracts consumed by the job engine.
//!
//! - `RepoResolver`: paginated repository resolution and index partitioning
//! - `AlertObserver`: turns a job's result into a best-effort diagnostic
//! - `SubRepoPermsChecker`: path-level read permission checks
//! - `Clients`: the bundle of handles threaded through every `run` call
//!
//! All traits are backend-agnostic. In-memory fakes are provided for testing
//! via the `fakes` module.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::alert::Alert;
use crate::context::{Actor, JobContext};
use crate::error::JobError;
use crate::inputs::SearchInputs;
use crate::repos::{RepoName, RepoOptions, RepositoryRevisions, ResolvedPage, ResolvedRepos, UseIndex};

// ---------------------------------------------------------------------------
// RepoResolver: repository pagination
// ---------------------------------------------------------------------------

/// Resolves repository filters into pages of repositories to search.
#[async_trait]
pub trait RepoResolver: Send + Sync {
    /// Stream pages for `opts`. The stream ends after the last page or after
    /// the first error; retries, if any, happen inside the resolver.
    fn paginate<'a>(
        &'a self,
        ctx: &'a JobContext,
        opts: &'a RepoOptions,
    ) -> BoxStream<'a, anyhow::Result<ResolvedPage>>;

    /// Split a page into repositories the index serves and the rest.
    async fn partition(
        &self,
        ctx: &JobContext,
        repos: &[RepositoryRevisions],
        use_index: UseIndex,
        contains_ref_globs: bool,
    ) -> anyhow::Result<ResolvedRepos>;
}

// ---------------------------------------------------------------------------
// AlertObserver: diagnostics
// ---------------------------------------------------------------------------

/// What an [`AlertObserver`] decided.
#[derive(Debug, Default)]
pub struct AlertVerdict {
    pub alert: Option<Alert>,
    /// The error that should still be reported. Observers may absorb errors
    /// they turned into an alert.
    pub error: Option<JobError>,
}

/// Produces a best-effort diagnostic for a finished job tree.
#[async_trait]
pub trait AlertObserver: Send + Sync {
    async fn observe(
        &self,
        ctx: &JobContext,
        inputs: &SearchInputs,
        has_results: bool,
        error: Option<JobError>,
    ) -> AlertVerdict;
}

// ---------------------------------------------------------------------------
// SubRepoPermsChecker: path-level authorization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perms {
    None,
    Read,
}

/// A path inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoContent {
    pub repo: RepoName,
    pub path: String,
}

/// Answers whether an actor may read paths within a repository.
///
/// Checks are synchronous: they run inside [`Sender::send`](crate::event::Sender::send).
/// Implementations should serve them from a cache.
pub trait SubRepoPermsChecker: Send + Sync {
    /// False when sub-repo permissions are not configured at all, in which
    /// case no filtering is needed.
    fn enabled(&self) -> bool;

    fn permissions(&self, actor: &Actor, content: &RepoContent) -> anyhow::Result<Perms>;
}

/// Permissions of `actor` for `content`. Internal actors may read anything.
pub fn actor_permissions(
    checker: &dyn SubRepoPermsChecker,
    actor: &Actor,
    content: &RepoContent,
) -> anyhow::Result<Perms> {
    if actor.internal || !checker.enabled() {
        return Ok(Perms::Read);
    }
    checker.permissions(actor, content)
}

/// True if `actor` may read at least one of `paths` in `repo`.
pub fn can_read_any_path(
    checker: &dyn SubRepoPermsChecker,
    actor: &Actor,
    repo: &RepoName,
    paths: &[String],
) -> anyhow::Result<bool> {
    if actor.internal || !checker.enabled() {
        return Ok(true);
    }
    for path in paths {
        let content = RepoContent {
            repo: repo.clone(),
            path: path.clone(),
        };
        if checker.permissions(actor, &content)? == Perms::Read {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Clients: runtime handle bundle
// ---------------------------------------------------------------------------

/// Handles threaded through every `run` call.
///
/// Besides the three collaborators the engine itself calls, `Clients` carries
/// opaque backend handles (database pools, index clients, ...) that only leaf
/// jobs know how to use. They are looked up by type.
#[derive(Clone)]
pub struct Clients {
    pub resolver: Arc<dyn RepoResolver>,
    pub alert_observer: Arc<dyn AlertObserver>,
    pub perms_checker: Arc<dyn SubRepoPermsChecker>,
    handles: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Clients {
    pub fn new(
        resolver: Arc<dyn RepoResolver>,
        alert_observer: Arc<dyn AlertObserver>,
        perms_checker: Arc<dyn SubRepoPermsChecker>,
    ) -> Self {
        Self {
            resolver,
            alert_observer,
            perms_checker,
            handles: Arc::new(HashMap::new()),
        }
    }

    /// Attach a backend handle, replacing any previous handle of that type.
    pub fn with_handle<T: Any + Send + Sync>(mut self, handle: Arc<T>) -> Self {
        Arc::make_mut(&mut self.handles).insert(TypeId::of::<T>(), handle);
        self
    }

    pub fn handle<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.handles
            .get(&TypeId::of::<T>())
            .and_then(|h| Arc::clone(h).downcast::<T>().ok())
    }
}

impl fmt::Debug for Clients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clients")
            .field("handles", &self.handles.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[derive(Debug, PartialEq)]
    struct IndexClient(&'static str);

    #[test]
    fn test_handles_are_looked_up_by_type() {
        let clients = fakes::clients().with_handle(Arc::new(IndexClient("zoekt:6070")));
        let handle = clients.handle::<IndexClient>().unwrap();
        assert_eq!(*handle, IndexClient("zoekt:6070"));
        assert!(clients.handle::<String>().is_none());
    }

    #[test]
    fn test_internal_actor_bypasses_checker() {
        let checker = fakes::PathPermsChecker::default().deny("org/secret", "private/key.pem");
        let content = RepoContent {
            repo: RepoName::from("org/secret"),
            path: "private/key.pem".into(),
        };
        assert_eq!(
            actor_permissions(&checker, &Actor::internal(), &content).unwrap(),
            Perms::Read
        );
        assert_eq!(
            actor_permissions(&checker, &Actor::user(1), &content).unwrap(),
            Perms::None
        );
    }

    #[test]
    fn test_can_read_any_path_accepts_one_readable_path() {
        let checker = fakes::PathPermsChecker::default().deny("org/r", "a");
        let repo = RepoName::from("org/r");
        let actor = Actor::user(1);
        assert!(can_read_any_path(&checker, &actor, &repo, &["a".into(), "b".into()]).unwrap());
        assert!(!can_read_any_path(&checker, &actor, &repo, &["a".into()]).unwrap());
    }
}
