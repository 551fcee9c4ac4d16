//! Repository data produced by the resolver and consumed by leaf jobs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::{RepoStatus, RepoStatusMap, Stats};

/// Numeric repository id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoId(pub u32);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repository name, e.g. `github.com/org/repo`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl RepoName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        RepoName(s.to_string())
    }
}

/// The smallest description of a repository a match needs to carry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MinimalRepo {
    pub id: RepoId,
    pub name: RepoName,
}

impl MinimalRepo {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id: RepoId(id),
            name: RepoName::from(name),
        }
    }
}

/// A repository and the revisions to search in it. An empty revision string
/// means the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRevisions {
    pub repo: MinimalRepo,
    pub revs: Vec<String>,
}

impl RepositoryRevisions {
    /// Search `repo` at its default branch.
    pub fn head(repo: MinimalRepo) -> Self {
        Self {
            repo,
            revs: vec![String::new()],
        }
    }
}

/// Whether indexed search may, must, or must not be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseIndex {
    #[default]
    Yes,
    Only,
    No,
}

/// Filters selecting which repositories a search covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoOptions {
    pub repo_filters: Vec<String>,
    pub minus_repo_filters: Vec<String>,
    pub search_context_spec: Option<String>,
    pub use_index: UseIndex,
    pub only_cloned: bool,
    pub no_forks: bool,
    pub no_archived: bool,
    /// Page size requested from the resolver, `None` for its default.
    pub limit: Option<usize>,
}

/// One page of resolved repositories.
///
/// Besides the repositories themselves a page can carry statistics that must
/// reach the caller even if the page produces no matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPage {
    pub repo_revs: Vec<RepositoryRevisions>,
    /// Backend shards that could not be reached while resolving.
    pub backends_missing: u32,
    /// Repositories that matched but cannot be searched (missing, cloning).
    pub status: RepoStatusMap,
}

impl ResolvedPage {
    pub fn new(repo_revs: Vec<RepositoryRevisions>) -> Self {
        Self {
            repo_revs,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, repo: &MinimalRepo, status: RepoStatus) -> Self {
        self.status.update(repo.id, status);
        self
    }

    /// The statistics this page contributes, `None` when there are none.
    pub fn stats(&self) -> Option<Stats> {
        if self.backends_missing == 0 && self.status.is_empty() {
            return None;
        }
        Some(Stats {
            backends_missing: self.backends_missing,
            status: self.status.clone(),
            ..Stats::default()
        })
    }
}

/// A page split into the repositories an index serves and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRepos {
    pub indexed: Vec<RepositoryRevisions>,
    pub unindexed: Vec<RepositoryRevisions>,
}

impl ResolvedRepos {
    /// Everything unindexed, used when partitioning is skipped.
    pub fn unpartitioned(repo_revs: Vec<RepositoryRevisions>) -> Self {
        Self {
            indexed: Vec::new(),
            unindexed: repo_revs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.unindexed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.unindexed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_without_stats_reports_none() {
        let page = ResolvedPage::new(vec![RepositoryRevisions::head(MinimalRepo::new(1, "a"))]);
        assert!(page.stats().is_none());
    }

    #[test]
    fn test_page_stats_carry_missing_backends_and_status() {
        let repo = MinimalRepo::new(2, "org/cloning");
        let mut page = ResolvedPage::default().with_status(&repo, RepoStatus::CLONING);
        page.backends_missing = 3;
        let stats = page.stats().unwrap();
        assert_eq!(stats.backends_missing, 3);
        assert!(stats.status.any(RepoStatus::CLONING));
    }

    #[test]
    fn test_unpartitioned_puts_everything_unindexed() {
        let repos = vec![
            RepositoryRevisions::head(MinimalRepo::new(1, "a")),
            RepositoryRevisions::head(MinimalRepo::new(2, "b")),
        ];
        let resolved = ResolvedRepos::unpartitioned(repos);
        assert!(resolved.indexed.is_empty());
        assert_eq!(resolved.len(), 2);
    }
}
