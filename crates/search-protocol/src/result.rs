//! Search results.
//!
//! Combinators treat a [`Match`] as opaque apart from three capabilities:
//! a deduplication [`MatchKey`], a contribution to a result-count limit
//! (`result_count` / `limit`), and merging two reports of the same match
//! (`append_matches`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::{MinimalRepo, RepoName};

/// A position in a file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Location {
    /// Byte offset from the start of the file.
    pub offset: usize,
    /// Zero-based line.
    pub line: usize,
    /// Zero-based column in bytes.
    pub column: usize,
}

impl Location {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

/// A contiguous chunk of file content together with the ranges that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub content: String,
    pub content_start: Location,
    pub ranges: Vec<Range>,
}

impl ChunkMatch {
    pub fn match_count(&self) -> usize {
        self.ranges.len()
    }

    /// The text `range` covers, or `None` if it lies outside the chunk.
    pub fn matched_str(&self, range: &Range) -> Option<&str> {
        let start = range.start.offset.checked_sub(self.content_start.offset)?;
        let end = range.end.offset.checked_sub(self.content_start.offset)?;
        self.content.get(start..end)
    }

    /// The text covered by each range. Ranges outside the chunk are skipped.
    pub fn matched_strings(&self) -> Vec<&str> {
        self.ranges
            .iter()
            .filter_map(|range| self.matched_str(range))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub name: String,
    pub kind: String,
    pub line: usize,
}

/// A match inside (or on the path of) a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatch {
    pub repo: MinimalRepo,
    pub commit_id: String,
    /// The revision the user asked for, if any.
    pub input_rev: Option<String>,
    pub path: String,
    pub chunk_matches: Vec<ChunkMatch>,
    pub symbols: Vec<SymbolMatch>,
    /// The backend (or a limit) truncated the matches in this file.
    pub limit_hit: bool,
}

impl FileMatch {
    /// A match on the file path only, with no content matches.
    pub fn path_only(repo: MinimalRepo, commit_id: &str, path: &str) -> Self {
        Self {
            repo,
            commit_id: commit_id.to_string(),
            input_rev: None,
            path: path.to_string(),
            chunk_matches: Vec::new(),
            symbols: Vec::new(),
            limit_hit: false,
        }
    }

    pub fn is_path_match(&self) -> bool {
        self.chunk_matches.is_empty() && self.symbols.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.chunk_matches.iter().map(ChunkMatch::match_count).sum()
    }

    /// Every file match counts at least once, even a path-only one.
    pub fn result_count(&self) -> usize {
        (self.match_count() + self.symbols.len()).max(1)
    }

    /// Truncate to at most `limit` results, returning the unused budget.
    pub fn limit(&mut self, limit: usize) -> usize {
        let match_count = self.match_count();
        let symbol_count = self.symbols.len();
        if match_count == 0 && symbol_count == 0 {
            return limit.saturating_sub(1);
        }
        let total = match_count + symbol_count;
        if total <= limit {
            return limit - total;
        }

        let remaining = limit_chunks(&mut self.chunk_matches, limit);
        self.symbols.truncate(remaining.min(symbol_count));
        self.limit_hit = true;
        0
    }

    /// Merge the content matches of another report of the same file.
    pub fn append_matches(&mut self, other: &FileMatch) {
        for chunk in &other.chunk_matches {
            match self
                .chunk_matches
                .iter_mut()
                .find(|c| c.content_start == chunk.content_start && c.content == chunk.content)
            {
                Some(existing) => {
                    for range in &chunk.ranges {
                        if !existing.ranges.contains(range) {
                            existing.ranges.push(*range);
                        }
                    }
                    existing.ranges.sort();
                }
                None => self.chunk_matches.push(chunk.clone()),
            }
        }
        self.chunk_matches
            .sort_by_key(|chunk| chunk.content_start.offset);

        for symbol in &other.symbols {
            if !self.symbols.contains(symbol) {
                self.symbols.push(symbol.clone());
            }
        }
        self.limit_hit |= other.limit_hit;
    }

    pub fn key(&self) -> MatchKey {
        MatchKey {
            kind: MatchKind::File,
            repo: self.repo.name.clone(),
            rev: self.input_rev.clone().unwrap_or_else(|| self.commit_id.clone()),
            path: self.path.clone(),
        }
    }
}

fn limit_chunks(chunks: &mut Vec<ChunkMatch>, mut limit: usize) -> usize {
    let mut keep = 0;
    for chunk in chunks.iter_mut() {
        if limit == 0 {
            break;
        }
        if chunk.ranges.len() > limit {
            chunk.ranges.truncate(limit);
            limit = 0;
        } else {
            limit -= chunk.ranges.len();
        }
        keep += 1;
    }
    chunks.truncate(keep);
    limit
}

/// A repository whose name or metadata matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMatch {
    pub repo: MinimalRepo,
    pub rev: Option<String>,
    pub description: Option<String>,
}

impl RepoMatch {
    pub fn new(repo: MinimalRepo) -> Self {
        Self {
            repo,
            rev: None,
            description: None,
        }
    }
}

/// A commit (or diff) match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMatch {
    pub repo: MinimalRepo,
    pub commit: String,
    pub author: String,
    pub author_date: DateTime<Utc>,
    pub message: String,
    /// Rendered diff hunks when the search was a diff search.
    pub diff_preview: Option<String>,
    /// Paths touched by the commit; used for permission filtering.
    pub modified_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Repo,
    File,
    Commit,
}

/// Identity of a match for deduplication and intersection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub kind: MatchKind,
    pub repo: RepoName,
    /// Revision or commit, empty when not applicable.
    pub rev: String,
    /// File path, empty when not applicable.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Match {
    File(FileMatch),
    Repo(RepoMatch),
    Commit(CommitMatch),
}

impl Match {
    pub fn repo(&self) -> &MinimalRepo {
        match self {
            Match::File(m) => &m.repo,
            Match::Repo(m) => &m.repo,
            Match::Commit(m) => &m.repo,
        }
    }

    pub fn key(&self) -> MatchKey {
        match self {
            Match::File(m) => m.key(),
            Match::Repo(m) => MatchKey {
                kind: MatchKind::Repo,
                repo: m.repo.name.clone(),
                rev: m.rev.clone().unwrap_or_default(),
                path: String::new(),
            },
            Match::Commit(m) => MatchKey {
                kind: MatchKind::Commit,
                repo: m.repo.name.clone(),
                rev: m.commit.clone(),
                path: String::new(),
            },
        }
    }

    /// How much this match contributes to a result-count limit.
    pub fn result_count(&self) -> usize {
        match self {
            Match::File(m) => m.result_count(),
            Match::Repo(_) | Match::Commit(_) => 1,
        }
    }

    /// Truncate to at most `limit` results, returning the unused budget.
    pub fn limit(&mut self, limit: usize) -> usize {
        match self {
            Match::File(m) => m.limit(limit),
            Match::Repo(_) | Match::Commit(_) => limit.saturating_sub(1),
        }
    }

    /// Merge another report of the same match into this one. Only file
    /// matches carry mergeable content; everything else is left unchanged.
    pub fn append_matches(&mut self, other: &Match) {
        if let (Match::File(this), Match::File(other)) = (self, other) {
            this.append_matches(other);
        }
    }
}

/// Total result count of a batch of matches.
pub fn result_count(matches: &[Match]) -> usize {
    matches.iter().map(Match::result_count).sum()
}

/// Truncate `matches` so their result count is at most `limit`, returning the
/// unused budget. A match is only cut partway if it straddles the limit.
pub fn limit_matches(matches: &mut Vec<Match>, mut limit: usize) -> usize {
    let mut i = 0;
    while i < matches.len() {
        if limit == 0 {
            matches.truncate(i);
            return 0;
        }
        limit = matches[i].limit(limit);
        i += 1;
    }
    limit
}
