//! Progress statistics that travel alongside matches.
//!
//! [`Stats`] is a monoid: counts add, flags OR, and per-repository status
//! sets union. The zero value is `Stats::default()`.

use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::repos::RepoId;

/// Set of conditions a repository was in while being searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoStatus(u8);

impl RepoStatus {
    pub const CLONING: RepoStatus = RepoStatus(1);
    pub const MISSING: RepoStatus = RepoStatus(1 << 1);
    pub const TIMEDOUT: RepoStatus = RepoStatus(1 << 2);
    pub const INDEXED: RepoStatus = RepoStatus(1 << 3);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: RepoStatus) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: RepoStatus) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for RepoStatus {
    type Output = RepoStatus;

    fn bitor(self, rhs: RepoStatus) -> RepoStatus {
        RepoStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for RepoStatus {
    fn bitor_assign(&mut self, rhs: RepoStatus) {
        self.0 |= rhs.0;
    }
}

/// Per-repository status flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatusMap(BTreeMap<RepoId, RepoStatus>);

impl RepoStatusMap {
    /// OR `status` into the flags recorded for `repo`.
    pub fn update(&mut self, repo: RepoId, status: RepoStatus) {
        if status.is_empty() {
            return;
        }
        *self.0.entry(repo).or_default() |= status;
    }

    pub fn union(&mut self, other: &RepoStatusMap) {
        for (repo, status) in &other.0 {
            self.update(*repo, *status);
        }
    }

    pub fn get(&self, repo: RepoId) -> RepoStatus {
        self.0.get(&repo).copied().unwrap_or_default()
    }

    /// True if any repository has any of the flags in `status`.
    pub fn any(&self, status: RepoStatus) -> bool {
        self.0.values().any(|s| s.intersects(status))
    }

    /// Repositories carrying every flag in `status`, in id order.
    pub fn filter(&self, status: RepoStatus) -> Vec<RepoId> {
        self.0
            .iter()
            .filter(|(_, s)| s.contains(status))
            .map(|(repo, _)| *repo)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RepoId, RepoStatus)> + '_ {
        self.0.iter().map(|(repo, status)| (*repo, *status))
    }
}

/// Statistics accumulated while a search runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Some result limit was reached and results were truncated.
    pub is_limit_hit: bool,
    /// Archived repositories excluded by default.
    pub excluded_archived: u32,
    /// Forked repositories excluded by default.
    pub excluded_forks: u32,
    /// Backend shards that could not be reached.
    pub backends_missing: u32,
    pub status: RepoStatusMap,
}

impl Stats {
    /// A stats-only value announcing that a limit was hit.
    pub fn limit_hit() -> Self {
        Stats {
            is_limit_hit: true,
            ..Stats::default()
        }
    }

    /// Fold `other` into `self`.
    pub fn update(&mut self, other: &Stats) {
        self.is_limit_hit |= other.is_limit_hit;
        self.excluded_archived += other.excluded_archived;
        self.excluded_forks += other.excluded_forks;
        self.backends_missing += other.backends_missing;
        self.status.union(&other.status);
    }

    pub fn is_zero(&self) -> bool {
        *self == Stats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_adds_counts_and_ors_flags() {
        let mut a = Stats {
            excluded_forks: 2,
            backends_missing: 1,
            ..Stats::default()
        };
        let b = Stats {
            is_limit_hit: true,
            excluded_forks: 3,
            excluded_archived: 4,
            ..Stats::default()
        };
        a.update(&b);
        assert!(a.is_limit_hit);
        assert_eq!(a.excluded_forks, 5);
        assert_eq!(a.excluded_archived, 4);
        assert_eq!(a.backends_missing, 1);
    }

    #[test]
    fn test_status_sets_union() {
        let mut a = Stats::default();
        a.status.update(RepoId(1), RepoStatus::CLONING);
        let mut b = Stats::default();
        b.status.update(RepoId(1), RepoStatus::TIMEDOUT);
        b.status.update(RepoId(2), RepoStatus::MISSING);
        a.update(&b);

        assert!(a.status.get(RepoId(1)).contains(RepoStatus::CLONING | RepoStatus::TIMEDOUT));
        assert_eq!(a.status.filter(RepoStatus::MISSING), vec![RepoId(2)]);
        assert!(a.status.any(RepoStatus::TIMEDOUT));
    }

    #[test]
    fn test_zero_is_identity() {
        let mut a = Stats::limit_hit();
        a.update(&Stats::default());
        assert_eq!(a, Stats::limit_hit());
        assert!(Stats::default().is_zero());
    }

    #[test]
    fn test_empty_status_is_not_recorded() {
        let mut map = RepoStatusMap::default();
        map.update(RepoId(9), RepoStatus::default());
        assert!(map.is_empty());
    }
}
