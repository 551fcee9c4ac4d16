//! Structured observability hooks for query lifecycle events.
//!
//! This module provides:
//! - Query-scoped tracing spans via [`query_span`]
//! - Emission functions for key lifecycle events: start, finish, limit hit,
//!   page resolution, alert raised, permission filter failure
//!
//! Events are emitted at `info!` level, failures at `warn!` (configurable via
//! the `SEARCH_LOG` env var, see [`crate::telemetry`]).

use tracing::{info, warn};
use uuid::Uuid;

use search_protocol::Alert;

/// A fresh identifier for one query execution.
pub fn new_query_id() -> String {
    Uuid::new_v4().to_string()
}

/// A span tagged with `query_id`. Attach it to the query's future with
/// [`tracing::Instrument`] so every job event carries the id.
pub fn query_span(query_id: &str) -> tracing::Span {
    tracing::info_span!("search.query", query_id = %query_id)
}

/// Emit event: query started with its root job.
pub fn emit_query_started(query_id: &str, root_job: &str) {
    info!(event = "query.started", query_id = %query_id, root_job = %root_job);
}

/// Emit event: query finished with duration, result count and outcome.
pub fn emit_query_finished(query_id: &str, duration_ms: u64, results: usize, success: bool) {
    info!(
        event = "query.finished",
        query_id = %query_id,
        duration_ms = duration_ms,
        results = results,
        success = success,
    );
}

pub fn emit_limit_hit(limit: usize) {
    info!(event = "limit.hit", limit = limit);
}

/// Emit event: one page of repositories resolved and partitioned.
pub fn emit_page_resolved(page: usize, indexed: usize, unindexed: usize) {
    info!(
        event = "repo_pager.page_resolved",
        page = page,
        indexed = indexed,
        unindexed = unindexed,
    );
}

pub fn emit_alert_raised(alert: &Alert) {
    info!(
        event = "alert.raised",
        title = %alert.title,
        priority = alert.priority,
        kind = alert.kind.as_deref().unwrap_or(""),
    );
}

/// Emit event: sub-repo permission lookups failed (warning level).
///
/// Only the count is logged; the failing paths stay out of the logs.
pub fn emit_sub_repo_filter_failed(errors: &[anyhow::Error]) {
    warn!(event = "sub_repo_filter.failed", failures = errors.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ids_are_unique() {
        assert_ne!(new_query_id(), new_query_id());
    }

    #[test]
    fn test_query_span_enter() {
        let span = query_span("test-query-id");
        let _entered = span.enter();
    }
}
