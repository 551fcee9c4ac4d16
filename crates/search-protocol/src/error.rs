//! Error taxonomy for the search job engine.
//!
//! Three kinds of failure flow through a job tree:
//! - cancellation / deadline ([`JobError::Cancelled`], [`JobError::DeadlineExceeded`]),
//!   which the combinator that caused it is expected to swallow;
//! - partial backend failure, which is *not* an error and travels as
//!   [`Stats`](crate::Stats) instead;
//! - hard failures, which are aggregated across siblings into
//!   [`JobError::Multi`] and never dropped.

use std::fmt;

use thiserror::Error;

/// Why a [`JobContext`](crate::JobContext) stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors produced while running a job tree.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job's context was canceled.
    #[error("context canceled")]
    Cancelled,

    /// The job's context reached its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A leaf job's backend failed.
    #[error("{job}: {source}")]
    Backend {
        job: String,
        #[source]
        source: anyhow::Error,
    },

    /// The repository resolver failed to produce or partition a page.
    #[error("repository resolution failed: {0}")]
    Resolver(#[source] anyhow::Error),

    /// One or more sub-repo permission checks failed. Deliberately carries no
    /// detail about which paths were involved.
    #[error("subRepoFilterFunc")]
    SubRepoPermsFilter,

    /// A child task panicked or was aborted before reporting.
    #[error("{job} task failed: {detail}")]
    TaskFailed { job: String, detail: String },

    /// A select path could not be parsed.
    #[error("invalid select path: {0}")]
    InvalidSelect(String),

    /// Errors aggregated from concurrently running siblings.
    #[error(transparent)]
    Multi(MultiError),
}

/// Result type for job operations.
pub type JobResult<T> = std::result::Result<T, JobError>;

impl From<ContextError> for JobError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => JobError::Cancelled,
            ContextError::DeadlineExceeded => JobError::DeadlineExceeded,
        }
    }
}

impl JobError {
    /// Wrap a backend failure reported by the leaf job named `job`.
    pub fn backend(job: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        JobError::Backend {
            job: job.into(),
            source: source.into(),
        }
    }

    /// True if this error, or any member of an aggregate, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            JobError::Cancelled => true,
            JobError::Multi(multi) => multi.iter().any(JobError::is_cancelled),
            _ => false,
        }
    }

    /// True if this error, or any member of an aggregate, is a deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            JobError::DeadlineExceeded => true,
            JobError::Multi(multi) => multi.iter().any(JobError::is_deadline_exceeded),
            _ => false,
        }
    }

    /// True if every member of this error is a cancellation or deadline.
    pub fn is_context_only(&self) -> bool {
        match self {
            JobError::Cancelled | JobError::DeadlineExceeded => true,
            JobError::Multi(multi) => multi.iter().all(JobError::is_context_only),
            _ => false,
        }
    }

    /// Drop every [`JobError::Cancelled`] member, keeping the rest.
    ///
    /// Returns `None` when nothing but cancellations remained.
    pub fn without_cancellation(self) -> Option<JobError> {
        self.retain(|err| !matches!(err, JobError::Cancelled))
    }

    /// Drop every [`JobError::DeadlineExceeded`] member, keeping the rest.
    pub fn without_deadline(self) -> Option<JobError> {
        self.retain(|err| !matches!(err, JobError::DeadlineExceeded))
    }

    fn retain(self, keep: impl Fn(&JobError) -> bool + Copy) -> Option<JobError> {
        match self {
            JobError::Multi(multi) => {
                let mut set = ErrorSet::default();
                for err in multi.0 {
                    if let Some(err) = err.retain(keep) {
                        set.push(err);
                    }
                }
                set.into_error()
            }
            other if keep(&other) => Some(other),
            _ => None,
        }
    }
}

/// Several errors reported by sibling jobs.
#[derive(Debug, Default)]
pub struct MultiError(Vec<JobError>);

impl MultiError {
    pub fn iter(&self) -> impl Iterator<Item = &JobError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<JobError> {
        self.0
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Accumulates errors from several children.
///
/// Nested aggregates are flattened so `is_cancelled()` and friends only need
/// to look one level deep in practice.
#[derive(Debug, Default)]
pub struct ErrorSet {
    errors: Vec<JobError>,
}

impl ErrorSet {
    pub fn push(&mut self, err: JobError) {
        match err {
            JobError::Multi(multi) => self.errors.extend(multi.0),
            err => self.errors.push(err),
        }
    }

    pub fn extend(&mut self, err: Option<JobError>) {
        if let Some(err) = err {
            self.push(err);
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse into `None` (no errors), the single error, or a [`MultiError`].
    pub fn into_error(mut self) -> Option<JobError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => Some(JobError::Multi(MultiError(self.errors))),
        }
    }

    pub fn into_result(self) -> JobResult<()> {
        match self.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
