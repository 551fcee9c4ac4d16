use std::sync::{Arc, Mutex, PoisonError};

use search_protocol::{Match, SearchEvent, SelectPath, Sender, SharedSender};

use super::Deduper;

/// Projects every match onto a select path and drops repeated projections.
///
/// A repeated file projection that carries content is still forwarded, so
/// every chunk match of a file reaches the caller. Path-only repeats are
/// dropped.
pub struct SelectSender {
    parent: SharedSender,
    path: SelectPath,
    deduper: Mutex<Deduper>,
}

impl SelectSender {
    pub fn wrap(parent: SharedSender, path: SelectPath) -> SharedSender {
        Arc::new(Self {
            parent,
            path,
            deduper: Mutex::new(Deduper::new()),
        })
    }
}

impl Sender for SelectSender {
    fn send(&self, mut event: SearchEvent) {
        {
            let mut deduper = self.deduper.lock().unwrap_or_else(PoisonError::into_inner);
            let mut selected = Vec::with_capacity(event.results.len());
            for m in &event.results {
                let Some(current) = m.select(&self.path) else {
                    continue;
                };
                if deduper.seen(&current) {
                    match &current {
                        Match::File(fm) if !fm.is_path_match() => {}
                        _ => continue,
                    }
                }
                deduper.add(&current);
                selected.push(current);
            }
            event.results = selected;
        }
        self.parent.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_protocol::{AggregatingSender, FileMatch, MinimalRepo};

    fn file(repo: &str, path: &str) -> Match {
        Match::File(FileMatch::path_only(MinimalRepo::new(1, repo), "abc", path))
    }

    #[test]
    fn test_select_repo_dedups_projections() {
        let agg = AggregatingSender::new();
        let sender = SelectSender::wrap(agg.clone(), SelectPath::Repository);
        sender.send(SearchEvent::from_results(vec![
            file("org/a", "x.go"),
            file("org/a", "y.go"),
        ]));
        sender.send(SearchEvent::from_results(vec![file("org/a", "z.go")]));
        assert_eq!(agg.result_count(), 1);
    }

    #[test]
    fn test_select_directory_drops_path_only_repeats() {
        let agg = AggregatingSender::new();
        let sender = SelectSender::wrap(agg.clone(), SelectPath::FileDirectory);
        sender.send(SearchEvent::from_results(vec![
            file("org/a", "cmd/x.go"),
            file("org/a", "cmd/y.go"),
            file("org/a", "lib/z.go"),
        ]));
        let paths: Vec<_> = agg.results().iter().map(|m| m.key().path).collect();
        assert_eq!(paths, vec!["cmd/", "lib/"]);
    }
}
