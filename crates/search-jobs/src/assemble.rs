//! Helpers for a query planner assembling job trees.
//!
//! A planner builds one job per basic query, wraps each with
//! [`BasicJobWrapping`], combines them and hands the result to
//! [`plan_job`].

use std::time::Duration;

use regex::Regex;

use search_protocol::{Clients, SearchInputs, SelectPath};

use crate::config::EngineConfig;
use crate::job::Job;
use crate::mapper::order_racing_jobs;

/// Leaves to reorder with [`order_racing_jobs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RacingOrder {
    pub racing: Vec<&'static str>,
    pub primary: Vec<&'static str>,
}

/// The wrappers applied around the job of one basic query.
#[derive(Debug, Clone)]
pub struct BasicJobWrapping {
    pub select: Option<SelectPath>,
    pub sanitize_patterns: Vec<Regex>,
    pub max_results: usize,
    pub timeout: Duration,
    pub racing: Option<RacingOrder>,
}

impl BasicJobWrapping {
    /// Limits and timeout for a query under `inputs`.
    ///
    /// `count` and `requested_timeout` are the query's `count:` and
    /// `timeout:` values, if present.
    pub fn from_config(
        config: &EngineConfig,
        inputs: &SearchInputs,
        count: Option<usize>,
        requested_timeout: Option<Duration>,
    ) -> Self {
        Self {
            select: None,
            sanitize_patterns: Vec::new(),
            max_results: count.unwrap_or_else(|| config.default_limit(inputs.protocol)),
            timeout: config.timeout_for(inputs.protocol, requested_timeout, count.is_some()),
            racing: None,
        }
    }

    pub fn with_select(mut self, path: SelectPath) -> Self {
        self.select = Some(path);
        self
    }

    pub fn with_sanitize_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.sanitize_patterns = patterns;
        self
    }

    pub fn with_racing_order(mut self, order: RacingOrder) -> Self {
        self.racing = Some(order);
        self
    }

    /// Wrap `job`, innermost first: permission filter (only when sub-repo
    /// permissions are enabled), select, sanitize, limit, timeout. The
    /// racing reorder, if configured, is applied to the wrapped tree.
    pub fn wrap(&self, job: Job, clients: &Clients) -> Job {
        let mut job = job;
        if clients.perms_checker.enabled() {
            job = Job::sub_repo_perms_filter(job);
        }
        if let Some(path) = &self.select {
            job = Job::select(path.clone(), job);
        }
        if !self.sanitize_patterns.is_empty() {
            job = Job::sanitize(self.sanitize_patterns.clone(), job);
        }
        job = Job::limit(self.max_results, job);
        job = Job::timeout(self.timeout, job);
        match &self.racing {
            Some(order) => order_racing_jobs(&job, &order.racing, &order.primary),
            None => job,
        }
    }
}

/// Each operand of an And expression, capped at the configured operand limit.
pub fn and_operands(config: &EngineConfig, operands: Vec<Job>) -> Vec<Job> {
    operands
        .into_iter()
        .map(|operand| Job::limit(config.and_operand_limit, operand))
        .collect()
}

/// An And expression over `operands`: each operand capped at the configured
/// operand limit, with at most `max_concurrency` of them running at once.
pub fn and_job(config: &EngineConfig, operands: Vec<Job>) -> Job {
    Job::and(and_operands(config, operands)).with_max_concurrency(config.max_concurrency)
}

/// `required` with `optional` raced alongside it under the configured grace
/// window.
pub fn priority_job(config: &EngineConfig, required: Job, optional: Job) -> Job {
    Job::priority(required, optional).with_priority_grace(config.priority_grace())
}

/// The root of a query's job tree: the union of `jobs` under an alert job.
pub fn plan_job(config: &EngineConfig, inputs: SearchInputs, jobs: Vec<Job>) -> Job {
    Job::alert(
        inputs,
        Job::or(jobs).with_max_concurrency(config.max_concurrency),
    )
}
