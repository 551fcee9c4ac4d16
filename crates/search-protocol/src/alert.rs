//! Alerts: soft, user-facing diagnostics attached to a job outcome.
//!
//! Alerts combine by "max priority wins"; `None` is the identity.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A follow-up query the user may want to run instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedQuery {
    pub description: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub priority: i32,
    pub title: String,
    pub description: String,
    /// Stable machine-readable kind, used for metrics.
    pub kind: Option<String>,
    pub proposed_queries: Vec<ProposedQuery>,
}

impl Alert {
    pub fn new(priority: i32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            description: description.into(),
            kind: None,
            proposed_queries: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// The search ran out of time without per-repository timeout statistics
    /// explaining why.
    pub fn for_timeout(used: Duration, suggested: Duration, query: &str) -> Self {
        let used_secs = (used.as_millis() + 500) / 1000;
        let query = omit_timeout_field(query);
        let proposed = if query.is_empty() {
            format!("timeout:{}s", suggested.as_secs())
        } else {
            format!("timeout:{}s {}", suggested.as_secs(), query)
        };
        Self {
            priority: 0,
            title: "Timed out while searching".to_string(),
            description: format!("We weren't able to find any results in {used_secs}s."),
            kind: Some("timed_out".to_string()),
            proposed_queries: vec![ProposedQuery {
                description: "query with longer timeout".to_string(),
                query: proposed,
            }],
        }
    }

    /// An And expression produced nothing because one operand hit its cap.
    pub fn for_capped_and_expression() -> Self {
        Alert::new(
            0,
            "Too many files to search for expression",
            "One expression in the query requires a lot of work! This can happen with \
             negated text searches like '-content:', not-operators, or and-operators. \
             Try using the '-file:' or '-repo:' filters to narrow your search (like \
             excluding autogenerated files).",
        )
        .with_kind("exceed_and_expression_search_limit")
    }

    /// The higher-priority alert of the two; ties keep `a`.
    pub fn max_priority(a: Option<Alert>, b: Option<Alert>) -> Option<Alert> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b.priority > a.priority { b } else { a }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Folds alerts from several children.
#[derive(Debug, Default)]
pub struct MaxAlerter {
    alert: Option<Alert>,
}

impl MaxAlerter {
    pub fn add(&mut self, alert: Option<Alert>) {
        self.alert = Alert::max_priority(self.alert.take(), alert);
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    pub fn into_alert(self) -> Option<Alert> {
        self.alert
    }
}

/// A suggested timeout: twice what was used, in whole seconds, at least 2s.
pub fn suggest_longer_timeout(used: Duration) -> Duration {
    let doubled = used.saturating_mul(2);
    let secs = doubled.as_secs() + u64::from(doubled.subsec_nanos() > 0);
    Duration::from_secs(secs.max(2))
}

fn omit_timeout_field(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|token| !token.starts_with("timeout:"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_priority_prefers_higher() {
        let low = Alert::new(1, "low", "");
        let high = Alert::new(5, "high", "");
        let got = Alert::max_priority(Some(low.clone()), Some(high.clone())).unwrap();
        assert_eq!(got.title, "high");
        let got = Alert::max_priority(Some(high), Some(low)).unwrap();
        assert_eq!(got.title, "high");
    }

    #[test]
    fn test_none_is_identity() {
        let a = Alert::new(1, "a", "");
        assert_eq!(Alert::max_priority(None, Some(a.clone())), Some(a.clone()));
        assert_eq!(Alert::max_priority(Some(a.clone()), None), Some(a));
        assert_eq!(Alert::max_priority(None, None), None);
    }

    #[test]
    fn test_max_alerter_keeps_first_on_tie() {
        let mut m = MaxAlerter::default();
        m.add(Some(Alert::new(2, "first", "")));
        m.add(None);
        m.add(Some(Alert::new(2, "second", "")));
        assert_eq!(m.into_alert().unwrap().title, "first");
    }

    #[test]
    fn test_timeout_alert_proposes_longer_timeout() {
        let alert = Alert::for_timeout(
            Duration::from_millis(9_600),
            Duration::from_secs(20),
            "timeout:10s foo bar",
        );
        assert_eq!(alert.description, "We weren't able to find any results in 10s.");
        assert_eq!(alert.proposed_queries[0].query, "timeout:20s foo bar");
        assert_eq!(alert.kind.as_deref(), Some("timed_out"));
    }

    #[test]
    fn test_suggest_longer_timeout_rounds_up() {
        assert_eq!(suggest_longer_timeout(Duration::from_millis(300)), Duration::from_secs(2));
        assert_eq!(suggest_longer_timeout(Duration::from_millis(2_100)), Duration::from_secs(5));
    }
}
