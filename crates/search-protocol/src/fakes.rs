//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `StaticRepoResolver`, `RecordingAlertObserver`,
//! `NoopAlertObserver` and `PathPermsChecker` that satisfy the trait
//! contracts without any external services.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::alert::Alert;
use crate::collaborators::*;
use crate::context::{Actor, JobContext};
use crate::error::JobError;
use crate::inputs::SearchInputs;
use crate::repos::{RepoOptions, RepositoryRevisions, ResolvedPage, ResolvedRepos, UseIndex};

// ---------------------------------------------------------------------------
// StaticRepoResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum PageScript {
    Page(ResolvedPage),
    Fail(String),
}

/// Serves a fixed list of pages and partitions by a fixed set of indexed
/// repository names.
#[derive(Debug, Default)]
pub struct StaticRepoResolver {
    pages: Vec<PageScript>,
    indexed: HashSet<String>,
    partition_error: Option<String>,
    pages_served: AtomicUsize,
    partition_calls: AtomicUsize,
}

impl StaticRepoResolver {
    pub fn new(pages: Vec<ResolvedPage>) -> Self {
        Self {
            pages: pages.into_iter().map(PageScript::Page).collect(),
            ..Self::default()
        }
    }

    /// Mark repositories as served by the index.
    pub fn with_indexed(mut self, names: &[&str]) -> Self {
        self.indexed.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Append a page that fails with `msg`.
    pub fn then_fail(mut self, msg: &str) -> Self {
        self.pages.push(PageScript::Fail(msg.to_string()));
        self
    }

    /// Make every `partition` call fail with `msg`.
    pub fn fail_partition(mut self, msg: &str) -> Self {
        self.partition_error = Some(msg.to_string());
        self
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    pub fn partition_calls(&self) -> usize {
        self.partition_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoResolver for StaticRepoResolver {
    fn paginate<'a>(
        &'a self,
        _ctx: &'a JobContext,
        _opts: &'a RepoOptions,
    ) -> BoxStream<'a, anyhow::Result<ResolvedPage>> {
        stream::iter(self.pages.iter())
            .map(move |script| {
                self.pages_served.fetch_add(1, Ordering::SeqCst);
                match script {
                    PageScript::Page(page) => Ok(page.clone()),
                    PageScript::Fail(msg) => Err(anyhow::anyhow!(msg.clone())),
                }
            })
            .boxed()
    }

    async fn partition(
        &self,
        _ctx: &JobContext,
        repos: &[RepositoryRevisions],
        use_index: UseIndex,
        _contains_ref_globs: bool,
    ) -> anyhow::Result<ResolvedRepos> {
        self.partition_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.partition_error {
            anyhow::bail!("{msg}");
        }

        let mut resolved = ResolvedRepos::default();
        for rr in repos {
            let is_indexed = self.indexed.contains(rr.repo.name.as_str());
            match (use_index, is_indexed) {
                (UseIndex::No, _) => resolved.unindexed.push(rr.clone()),
                (_, true) => resolved.indexed.push(rr.clone()),
                (UseIndex::Only, false) => {}
                (UseIndex::Yes, false) => resolved.unindexed.push(rr.clone()),
            }
        }
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// Alert observers
// ---------------------------------------------------------------------------

/// Never produces an alert and passes errors through untouched.
#[derive(Debug, Default)]
pub struct NoopAlertObserver;

#[async_trait]
impl AlertObserver for NoopAlertObserver {
    async fn observe(
        &self,
        _ctx: &JobContext,
        _inputs: &SearchInputs,
        _has_results: bool,
        error: Option<JobError>,
    ) -> AlertVerdict {
        AlertVerdict { alert: None, error }
    }
}

/// What a [`RecordingAlertObserver`] was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub query: String,
    pub has_results: bool,
    pub error: Option<String>,
}

/// Records every observation and answers with a canned alert.
#[derive(Debug, Default)]
pub struct RecordingAlertObserver {
    alert: Option<Alert>,
    only_without_results: bool,
    absorb_errors: bool,
    observations: Mutex<Vec<Observation>>,
}

impl RecordingAlertObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(alert);
        self
    }

    /// Only return the canned alert when the job produced no results.
    pub fn only_without_results(mut self) -> Self {
        self.only_without_results = true;
        self
    }

    /// Swallow the observed error, as an observer that explained it would.
    pub fn absorb_errors(mut self) -> Self {
        self.absorb_errors = true;
        self
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertObserver for RecordingAlertObserver {
    async fn observe(
        &self,
        _ctx: &JobContext,
        inputs: &SearchInputs,
        has_results: bool,
        error: Option<JobError>,
    ) -> AlertVerdict {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Observation {
                query: inputs.query.clone(),
                has_results,
                error: error.as_ref().map(ToString::to_string),
            });

        let alert = match (self.only_without_results, has_results) {
            (true, true) => None,
            _ => self.alert.clone(),
        };
        let error = if self.absorb_errors { None } else { error };
        AlertVerdict { alert, error }
    }
}

// ---------------------------------------------------------------------------
// PathPermsChecker
// ---------------------------------------------------------------------------

/// Denies an explicit set of `(repo, path)` pairs and fails for an explicit
/// set of repositories.
#[derive(Debug)]
pub struct PathPermsChecker {
    enabled: bool,
    denied: HashSet<(String, String)>,
    failing_repos: HashSet<String>,
    checks: AtomicUsize,
}

impl Default for PathPermsChecker {
    fn default() -> Self {
        Self {
            enabled: true,
            denied: HashSet::new(),
            failing_repos: HashSet::new(),
            checks: AtomicUsize::new(0),
        }
    }
}

impl PathPermsChecker {
    /// A checker for an instance without sub-repo permissions.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn deny(mut self, repo: &str, path: &str) -> Self {
        self.denied.insert((repo.to_string(), path.to_string()));
        self
    }

    pub fn fail_for(mut self, repo: &str) -> Self {
        self.failing_repos.insert(repo.to_string());
        self
    }

    /// Number of `permissions` calls answered so far.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl SubRepoPermsChecker for PathPermsChecker {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn permissions(&self, _actor: &Actor, content: &RepoContent) -> anyhow::Result<Perms> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.failing_repos.contains(content.repo.as_str()) {
            anyhow::bail!("permissions lookup failed for {}", content.repo);
        }
        let key = (content.repo.to_string(), content.path.clone());
        if self.denied.contains(&key) {
            Ok(Perms::None)
        } else {
            Ok(Perms::Read)
        }
    }
}

/// A `Clients` bundle backed entirely by fakes: no repositories, no alerts,
/// sub-repo permissions disabled.
pub fn clients() -> Clients {
    Clients::new(
        Arc::new(StaticRepoResolver::default()),
        Arc::new(NoopAlertObserver),
        Arc::new(PathPermsChecker::disabled()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::MinimalRepo;

    fn rr(id: u32, name: &str) -> RepositoryRevisions {
        RepositoryRevisions::head(MinimalRepo::new(id, name))
    }

    #[tokio::test]
    async fn test_static_resolver_serves_pages_then_error() {
        let resolver = StaticRepoResolver::new(vec![ResolvedPage::new(vec![rr(1, "a")])])
            .then_fail("database is down");
        let ctx = JobContext::default();
        let opts = RepoOptions::default();
        let pages: Vec<_> = resolver.paginate(&ctx, &opts).collect().await;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(pages[1].as_ref().unwrap_err().to_string().contains("database is down"));
        assert_eq!(resolver.pages_served(), 2);
    }

    #[tokio::test]
    async fn test_partition_respects_use_index() {
        let resolver = StaticRepoResolver::default().with_indexed(&["indexed"]);
        let ctx = JobContext::default();
        let repos = vec![rr(1, "indexed"), rr(2, "plain")];

        let yes = resolver.partition(&ctx, &repos, UseIndex::Yes, false).await.unwrap();
        assert_eq!(yes.indexed.len(), 1);
        assert_eq!(yes.unindexed.len(), 1);

        let only = resolver.partition(&ctx, &repos, UseIndex::Only, false).await.unwrap();
        assert_eq!(only.len(), 1);

        let no = resolver.partition(&ctx, &repos, UseIndex::No, false).await.unwrap();
        assert!(no.indexed.is_empty());
        assert_eq!(no.unindexed.len(), 2);
        assert_eq!(resolver.partition_calls(), 3);
    }

    #[tokio::test]
    async fn test_recording_observer_records_and_absorbs() {
        let observer = RecordingAlertObserver::new()
            .with_alert(Alert::new(1, "No results", ""))
            .absorb_errors();
        let verdict = observer
            .observe(
                &JobContext::default(),
                &SearchInputs::new("foo"),
                false,
                Some(JobError::Cancelled),
            )
            .await;
        assert!(verdict.error.is_none());
        assert_eq!(verdict.alert.unwrap().title, "No results");
        assert_eq!(observer.observations()[0].error.as_deref(), Some("context canceled"));
    }
}
