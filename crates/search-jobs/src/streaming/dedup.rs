use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use search_protocol::{Match, MatchKey, SearchEvent, Sender, SharedSender};

/// Remembers which match identities have been seen.
#[derive(Debug, Default)]
pub struct Deduper {
    seen: HashSet<MatchKey>,
}

impl Deduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, m: &Match) -> bool {
        self.seen.contains(&m.key())
    }

    pub fn add(&mut self, m: &Match) {
        self.seen.insert(m.key());
    }
}

/// Drops any match whose identity was already forwarded.
pub struct DedupSender {
    parent: SharedSender,
    deduper: Mutex<Deduper>,
}

impl DedupSender {
    pub fn wrap(parent: SharedSender) -> SharedSender {
        Arc::new(Self {
            parent,
            deduper: Mutex::new(Deduper::new()),
        })
    }
}

impl Sender for DedupSender {
    fn send(&self, mut event: SearchEvent) {
        {
            let mut deduper = self.deduper.lock().unwrap_or_else(PoisonError::into_inner);
            event.results.retain(|m| {
                if deduper.seen(m) {
                    return false;
                }
                deduper.add(m);
                true
            });
        }
        self.parent.send(event);
    }
}
