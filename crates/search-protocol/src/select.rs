//! `select:` projections that reduce matches to one field of interest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::result::{CommitMatch, FileMatch, Match, RepoMatch};

/// The field a search result is projected onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectPath {
    /// `select:repo`
    Repository,
    /// `select:file`
    File,
    /// `select:file.directory`
    FileDirectory,
    /// `select:content`
    Content,
    /// `select:symbol` or `select:symbol.<kind>`
    Symbol(Option<String>),
    /// `select:commit`
    Commit,
}

impl FromStr for SelectPath {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '.');
        let head = parts.next().unwrap_or_default();
        let tail = parts.next();
        match (head, tail) {
            ("repo", None) => Ok(SelectPath::Repository),
            ("file", None) => Ok(SelectPath::File),
            ("file", Some("directory")) => Ok(SelectPath::FileDirectory),
            ("content", None) => Ok(SelectPath::Content),
            ("symbol", kind) => Ok(SelectPath::Symbol(kind.map(str::to_string))),
            ("commit", None) => Ok(SelectPath::Commit),
            _ => Err(JobError::InvalidSelect(s.to_string())),
        }
    }
}

impl fmt::Display for SelectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectPath::Repository => f.write_str("repo"),
            SelectPath::File => f.write_str("file"),
            SelectPath::FileDirectory => f.write_str("file.directory"),
            SelectPath::Content => f.write_str("content"),
            SelectPath::Symbol(None) => f.write_str("symbol"),
            SelectPath::Symbol(Some(kind)) => write!(f, "symbol.{kind}"),
            SelectPath::Commit => f.write_str("commit"),
        }
    }
}

impl Match {
    /// Project this match onto `path`, or `None` if it has nothing there.
    pub fn select(&self, path: &SelectPath) -> Option<Match> {
        match path {
            SelectPath::Repository => {
                let rev = match self {
                    Match::File(m) => m.input_rev.clone(),
                    Match::Repo(m) => m.rev.clone(),
                    Match::Commit(_) => None,
                };
                Some(Match::Repo(RepoMatch {
                    repo: self.repo().clone(),
                    rev,
                    description: None,
                }))
            }
            SelectPath::File => match self {
                Match::File(m) => Some(Match::File(path_only(m, m.path.clone()))),
                _ => None,
            },
            SelectPath::FileDirectory => match self {
                Match::File(m) => Some(Match::File(path_only(m, parent_dir(&m.path)))),
                _ => None,
            },
            SelectPath::Content => match self {
                Match::File(m) if !m.chunk_matches.is_empty() => {
                    let mut content = m.clone();
                    content.symbols.clear();
                    Some(Match::File(content))
                }
                _ => None,
            },
            SelectPath::Symbol(kind) => match self {
                Match::File(m) => {
                    let symbols: Vec<_> = m
                        .symbols
                        .iter()
                        .filter(|s| kind.as_deref().map_or(true, |k| s.kind.eq_ignore_ascii_case(k)))
                        .cloned()
                        .collect();
                    if symbols.is_empty() {
                        return None;
                    }
                    let mut selected = path_only(m, m.path.clone());
                    selected.symbols = symbols;
                    Some(Match::File(selected))
                }
                _ => None,
            },
            SelectPath::Commit => match self {
                Match::Commit(m) => Some(Match::Commit(CommitMatch {
                    diff_preview: None,
                    ..m.clone()
                })),
                _ => None,
            },
        }
    }
}

fn path_only(m: &FileMatch, path: String) -> FileMatch {
    FileMatch {
        repo: m.repo.clone(),
        commit_id: m.commit_id.clone(),
        input_rev: m.input_rev.clone(),
        path,
        chunk_matches: Vec::new(),
        symbols: Vec::new(),
        limit_hit: false,
    }
}

/// `a/b/c.go` -> `a/b/`, a top-level file -> `/`.
fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}
