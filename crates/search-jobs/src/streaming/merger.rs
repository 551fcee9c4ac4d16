use std::collections::btree_map::{BTreeMap, Entry as Slot};
use std::sync::{Mutex, PoisonError};

use search_protocol::{Match, MatchKey};

#[derive(Debug)]
struct Entry {
    matched: Match,
    sources: Vec<bool>,
    sent: bool,
}

impl Entry {
    fn seen_by_all(&self) -> bool {
        self.sources.iter().all(|seen| *seen)
    }
}

/// Tracks, per match identity, which of `num_sources` children reported it.
///
/// A match becomes streamable once every source has reported it; it is
/// returned exactly once. Repeated reports of the same match are merged so
/// the forwarded value carries the union of their content.
#[derive(Debug)]
pub struct Merger {
    num_sources: usize,
    entries: Mutex<BTreeMap<MatchKey, Entry>>,
}

impl Merger {
    pub fn new(num_sources: usize) -> Self {
        Self {
            num_sources,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record `matches` as reported by `source`, returning those that just
    /// became streamable.
    pub fn add_matches(&self, matches: Vec<Match>, source: usize) -> Vec<Match> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut streamable = Vec::new();
        for m in matches {
            let entry = match entries.entry(m.key()) {
                Slot::Vacant(slot) => slot.insert(Entry {
                    matched: m,
                    sources: vec![false; self.num_sources],
                    sent: false,
                }),
                Slot::Occupied(slot) => {
                    let entry = slot.into_mut();
                    entry.matched.append_matches(&m);
                    entry
                }
            };
            if let Some(seen) = entry.sources.get_mut(source) {
                *seen = true;
            }
            if !entry.sent && entry.seen_by_all() {
                entry.sent = true;
                streamable.push(entry.matched.clone());
            }
        }
        streamable
    }

    /// Every match seen by at least one source but never streamed, ordered by
    /// identity. Each is returned once; later calls return only matches
    /// recorded since.
    pub fn unsent_tracked(&self) -> Vec<Match> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .values_mut()
            .filter(|entry| !entry.sent)
            .map(|entry| {
                entry.sent = true;
                entry.matched.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_protocol::{ChunkMatch, FileMatch, Location, MinimalRepo, Range};

    fn file(path: &str, line: usize) -> Match {
        let start = Location::new(line * 10, line, 0);
        let end = Location::new(line * 10 + 3, line, 3);
        let mut fm = FileMatch::path_only(MinimalRepo::new(1, "org/repo"), "abc", path);
        fm.chunk_matches.push(ChunkMatch {
            content: "foo bar".into(),
            content_start: Location::new(line * 10, line, 0),
            ranges: vec![Range { start, end }],
        });
        Match::File(fm)
    }

    #[test]
    fn test_streams_only_when_all_sources_reported() {
        let merger = Merger::new(3);
        assert!(merger.add_matches(vec![file("a.go", 1)], 0).is_empty());
        assert!(merger.add_matches(vec![file("a.go", 1)], 2).is_empty());
        assert_eq!(merger.add_matches(vec![file("a.go", 1)], 1).len(), 1);
        // already sent
        assert!(merger.add_matches(vec![file("a.go", 1)], 1).is_empty());
        assert!(merger.unsent_tracked().is_empty());
    }

    #[test]
    fn test_forwarded_match_carries_merged_content() {
        let merger = Merger::new(2);
        merger.add_matches(vec![file("a.go", 1)], 0);
        let out = merger.add_matches(vec![file("a.go", 4)], 1);
        let Match::File(fm) = &out[0] else {
            panic!("expected a file match");
        };
        assert_eq!(fm.chunk_matches.len(), 2);
    }

    #[test]
    fn test_unsent_tracked_returns_partial_matches_once() {
        let merger = Merger::new(2);
        merger.add_matches(vec![file("b.go", 1), file("a.go", 1)], 0);
        merger.add_matches(vec![file("a.go", 1)], 1);

        let unsent = merger.unsent_tracked();
        assert_eq!(unsent.len(), 1);
        assert_eq!(unsent[0].key().path, "b.go");
        assert!(merger.unsent_tracked().is_empty());
    }
}
