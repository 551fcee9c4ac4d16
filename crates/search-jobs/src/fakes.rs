//! Scripted leaf jobs and match builders (testing only)
//!
//! Leaves here honor the same contract as real backends: they stop promptly
//! when their context is done and report the context's error when they do.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use search_protocol::{
    Alert, ChunkMatch, Clients, CommitMatch, FileMatch, JobContext, JobError, JobResult,
    Location, Match, MinimalRepo, Range, RepoMatch, ResolvedRepos, SearchEvent, SharedSender,
};

use crate::job::LeafJob;

// ---------------------------------------------------------------------------
// Match builders
// ---------------------------------------------------------------------------

pub fn repo_match(id: u32, name: &str) -> Match {
    Match::Repo(RepoMatch::new(MinimalRepo::new(id, name)))
}

/// One event carrying a repository match per id, named `repo{id}`.
pub fn repo_event(ids: &[u32]) -> SearchEvent {
    SearchEvent::from_results(
        ids.iter()
            .map(|id| repo_match(*id, &format!("repo{id}")))
            .collect(),
    )
}

/// A file match with one single-range chunk per line. Each chunk's content
/// is eight bytes (`line0001`) and the range covers all of it.
pub fn file_match(id: u32, repo: &str, path: &str, lines: &[usize]) -> Match {
    let mut fm = FileMatch::path_only(MinimalRepo::new(id, repo), "deadbeef", path);
    fm.chunk_matches = lines
        .iter()
        .map(|line| {
            let start = Location::new(line * 100, *line, 0);
            let end = Location::new(line * 100 + 8, *line, 8);
            ChunkMatch {
                content: format!("line{line:04}"),
                content_start: start,
                ranges: vec![Range { start, end }],
            }
        })
        .collect();
    Match::File(fm)
}

pub fn commit_match(id: u32, repo: &str, commit: &str, modified: &[&str]) -> Match {
    Match::Commit(CommitMatch {
        repo: MinimalRepo::new(id, repo),
        commit: commit.to_string(),
        author: "dev".to_string(),
        author_date: Default::default(),
        message: format!("change {commit}"),
        diff_preview: None,
        modified_files: modified.iter().map(|f| f.to_string()).collect(),
    })
}

// ---------------------------------------------------------------------------
// StaticLeaf
// ---------------------------------------------------------------------------

/// Sends a fixed list of events, then finishes as configured.
pub struct StaticLeaf {
    name: &'static str,
    events: Vec<SearchEvent>,
    delay: Option<Duration>,
    alert: Option<Alert>,
    failure: Option<String>,
    cancel_on_finish: Option<JobContext>,
    wait: bool,
}

impl StaticLeaf {
    pub fn new(name: &'static str, events: Vec<SearchEvent>) -> Self {
        Self {
            name,
            events,
            delay: None,
            alert: None,
            failure: None,
            cancel_on_finish: None,
            wait: false,
        }
    }

    /// Sleep before sending the first event.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(alert);
        self
    }

    /// Fail with a backend error after sending every event.
    pub fn failing(mut self, msg: &str) -> Self {
        self.failure = Some(msg.to_string());
        self
    }

    /// Cancel `ctx` after sending every event, then return successfully.
    pub fn cancel_on_finish(mut self, ctx: JobContext) -> Self {
        self.cancel_on_finish = Some(ctx);
        self
    }

    /// After sending every event, block until the context is done.
    pub fn then_wait(mut self) -> Self {
        self.wait = true;
        self
    }
}

#[async_trait]
impl LeafJob for StaticLeaf {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        ctx: &JobContext,
        _clients: &Clients,
        sender: SharedSender,
    ) -> JobResult<Option<Alert>> {
        ctx.check()?;
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                err = ctx.done() => return Err(err.into()),
            }
        }
        for event in &self.events {
            ctx.check()?;
            sender.send(event.clone());
        }
        if self.wait {
            return Err(ctx.done().await.into());
        }
        if let Some(parent) = &self.cancel_on_finish {
            parent.cancel();
        }
        if let Some(msg) = &self.failure {
            return Err(JobError::backend(self.name, anyhow::anyhow!(msg.clone())));
        }
        Ok(self.alert.clone())
    }
}

// ---------------------------------------------------------------------------
// BlockingLeaf / PanickingLeaf
// ---------------------------------------------------------------------------

/// Sends nothing and returns only once its context is done.
pub struct BlockingLeaf {
    name: &'static str,
}

impl BlockingLeaf {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl LeafJob for BlockingLeaf {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        ctx: &JobContext,
        _clients: &Clients,
        _sender: SharedSender,
    ) -> JobResult<Option<Alert>> {
        Err(ctx.done().await.into())
    }
}

/// Panics when run. Used to prove a job was never started, or that a panic
/// in one task is contained.
pub struct PanickingLeaf {
    name: &'static str,
}

impl PanickingLeaf {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl LeafJob for PanickingLeaf {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        _ctx: &JobContext,
        _clients: &Clients,
        _sender: SharedSender,
    ) -> JobResult<Option<Alert>> {
        panic!("{} must not run", self.name)
    }
}

// ---------------------------------------------------------------------------
// RepoSubsetLeaf
// ---------------------------------------------------------------------------

/// A repository-searching leaf. Unresolved it searches nothing; resolved
/// against a page it records the page and reports one repository match per
/// repository in it.
pub struct RepoSubsetLeaf {
    name: &'static str,
    repos: Option<ResolvedRepos>,
    resolved: Arc<Mutex<Vec<ResolvedRepos>>>,
}

impl RepoSubsetLeaf {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            repos: None,
            resolved: Arc::default(),
        }
    }

    /// The repository sets this leaf (or any copy resolved from it) ran on.
    pub fn resolved(&self) -> Vec<ResolvedRepos> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A second handle sharing this leaf's record.
    pub fn observer(&self) -> RepoSubsetLeaf {
        Self {
            name: self.name,
            repos: self.repos.clone(),
            resolved: Arc::clone(&self.resolved),
        }
    }
}

#[async_trait]
impl LeafJob for RepoSubsetLeaf {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        ctx: &JobContext,
        _clients: &Clients,
        sender: SharedSender,
    ) -> JobResult<Option<Alert>> {
        ctx.check()?;
        let Some(repos) = &self.repos else {
            return Ok(None);
        };
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(repos.clone());

        let results = repos
            .indexed
            .iter()
            .chain(&repos.unindexed)
            .map(|rr| Match::Repo(RepoMatch::new(rr.repo.clone())))
            .collect();
        sender.send(SearchEvent::from_results(results));
        Ok(None)
    }

    fn resolve_repos(&self, repos: &ResolvedRepos) -> Option<Arc<dyn LeafJob>> {
        Some(Arc::new(Self {
            name: self.name,
            repos: Some(repos.clone()),
            resolved: Arc::clone(&self.resolved),
        }))
    }
}
