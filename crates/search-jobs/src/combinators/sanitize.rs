use regex::Regex;

use search_protocol::{
    sender_fn, Clients, CommitMatch, FileMatch, JobContext, Match, Outcome, Range,
    SearchEvent, SharedSender,
};

use crate::job::Job;
use crate::metrics::METRICS;

/// Removes content matching any of the configured patterns.
///
/// A matched range is dropped when its text matches a pattern. Chunks left
/// without ranges are dropped, and so is a file match left without chunks. Commits are dropped when
/// their diff preview matches. Symbol, path and repository matches pass
/// through.
#[derive(Debug, Clone)]
pub struct SanitizeJob {
    pub(crate) patterns: Vec<Regex>,
    pub(crate) child: Box<Job>,
}

impl PartialEq for SanitizeJob {
    fn eq(&self, other: &Self) -> bool {
        self.child == other.child
            && self.patterns.len() == other.patterns.len()
            && self
                .patterns
                .iter()
                .zip(&other.patterns)
                .all(|(a, b)| a.as_str() == b.as_str())
    }
}

impl SanitizeJob {
    pub(crate) async fn run(
        &self,
        ctx: &JobContext,
        clients: &Clients,
        sender: SharedSender,
    ) -> Outcome {
        let patterns = self.patterns.clone();
        let sanitizing = sender_fn(move |event: SearchEvent| {
            sender.send(sanitize_event(&patterns, event));
        });
        self.child.run(ctx, clients, sanitizing).await
    }
}

fn sanitize_event(patterns: &[Regex], mut event: SearchEvent) -> SearchEvent {
    let before = event.results.len();
    event.results = event
        .results
        .into_iter()
        .filter_map(|m| match m {
            Match::File(fm) => sanitize_file(patterns, fm).map(Match::File),
            Match::Commit(cm) => sanitize_commit(patterns, cm).map(Match::Commit),
            repo @ Match::Repo(_) => Some(repo),
        })
        .collect();
    METRICS.add_matches_filtered((before - event.results.len()) as u64);
    event
}

fn matches_any(patterns: &[Regex], value: &str) -> bool {
    patterns.iter().any(|re| re.is_match(value))
}

fn sanitize_file(patterns: &[Regex], mut fm: FileMatch) -> Option<FileMatch> {
    if !fm.symbols.is_empty() || fm.chunk_matches.is_empty() {
        return Some(fm);
    }
    for chunk in &mut fm.chunk_matches {
        let ranges = std::mem::take(&mut chunk.ranges);
        let kept: Vec<Range> = ranges
            .into_iter()
            .filter(|range| {
                chunk
                    .matched_str(range)
                    .map_or(true, |value| !matches_any(patterns, value))
            })
            .collect();
        chunk.ranges = kept;
    }
    fm.chunk_matches.retain(|chunk| !chunk.ranges.is_empty());
    if fm.chunk_matches.is_empty() {
        return None;
    }
    Some(fm)
}

fn sanitize_commit(patterns: &[Regex], cm: CommitMatch) -> Option<CommitMatch> {
    match &cm.diff_preview {
        Some(diff) if matches_any(patterns, diff) => None,
        _ => Some(cm),
    }
}
