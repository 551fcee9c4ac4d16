//! Cancellation context threaded from the root job to every leaf.
//!
//! A [`JobContext`] is a cheap, cloneable handle around a
//! [`CancellationToken`] plus an optional deadline and the acting identity.
//! Deriving a context (`with_cancel`, `with_timeout`) returns a
//! [`CancelGuard`] that cancels the derived token when dropped, so the
//! derived token is released on every exit path of the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{ContextError, JobError, JobResult};

/// The identity a search runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// User id, `None` for anonymous requests.
    pub uid: Option<i32>,
    /// Internal actors bypass sub-repo permission checks.
    pub internal: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(uid: i32) -> Self {
        Self {
            uid: Some(uid),
            internal: false,
        }
    }

    pub fn internal() -> Self {
        Self {
            uid: None,
            internal: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid.is_some()
    }
}

/// Cancellation scope for one job invocation.
#[derive(Debug, Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    actor: Actor,
}

/// Cancels a derived [`JobContext`] when dropped.
#[must_use = "dropping the guard cancels the derived context immediately"]
pub struct CancelGuard {
    _guard: DropGuard,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new(Actor::anonymous())
    }
}

impl JobContext {
    /// A fresh root context for `actor` with no deadline.
    pub fn new(actor: Actor) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            actor,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a child context that can be canceled independently of `self`.
    pub fn with_cancel(&self) -> (JobContext, CancelGuard) {
        let token = self.token.child_token();
        let guard = CancelGuard {
            _guard: token.clone().drop_guard(),
        };
        let ctx = JobContext {
            token,
            deadline: self.deadline,
            actor: self.actor.clone(),
        };
        (ctx, guard)
    }

    /// Derive a child context bound to `timeout` from now. An earlier
    /// inherited deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> (JobContext, CancelGuard) {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> (JobContext, CancelGuard) {
        let (mut ctx, guard) = self.with_cancel();
        ctx.deadline = Some(match self.deadline {
            Some(inherited) => inherited.min(deadline),
            None => deadline,
        });
        (ctx, guard)
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context stopped, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(ContextError::DeadlineExceeded);
        }
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `Err` with the context's error once it has stopped.
    pub fn check(&self) -> JobResult<()> {
        match self.err() {
            Some(err) => Err(JobError::from(err)),
            None => Ok(()),
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => self.err().unwrap_or(ContextError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_is_live() {
        let ctx = JobContext::default();
        assert!(ctx.err().is_none());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_child_cancel_does_not_cancel_parent() {
        let parent = JobContext::new(Actor::user(7));
        let (child, _guard) = parent.with_cancel();
        child.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert!(parent.err().is_none());
        assert_eq!(child.actor(), &Actor::user(7));
    }

    #[test]
    fn test_parent_cancel_propagates_to_child() {
        let parent = JobContext::default();
        let (child, _guard) = parent.with_cancel();
        parent.cancel();
        assert!(child.is_done());
    }

    #[test]
    fn test_dropping_guard_cancels_derived_context() {
        let parent = JobContext::default();
        let (child, guard) = parent.with_cancel();
        drop(guard);
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert!(parent.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_deadline_exceeded() {
        let ctx = JobContext::default();
        let (child, _guard) = ctx.with_timeout(Duration::from_millis(50));
        assert_eq!(child.done().await, ContextError::DeadlineExceeded);
        assert!(matches!(child.check(), Err(JobError::DeadlineExceeded)));
        assert!(ctx.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inherited_deadline_is_not_extended() {
        let ctx = JobContext::default();
        let (outer, _g1) = ctx.with_timeout(Duration::from_millis(10));
        let (inner, _g2) = outer.with_timeout(Duration::from_secs(10));
        assert_eq!(inner.deadline(), outer.deadline());
    }
}
