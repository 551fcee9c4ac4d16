//! Side-effect-free rewrites of a job tree.
//!
//! A [`Mapper`] rebuilds a tree post-order: every child is rewritten first,
//! then the hook registered for the rebuilt node's [`JobKind`] (if any) is
//! applied to it. The input tree is only read, so one template can be mapped
//! any number of times.

use std::collections::HashMap;

use crate::job::{Job, JobKind};

type Hook<'a> = Box<dyn FnMut(Job) -> Job + 'a>;

#[derive(Default)]
pub struct Mapper<'a> {
    hooks: HashMap<JobKind, Hook<'a>>,
    leaves: Option<Hook<'a>>,
}

impl<'a> Mapper<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite every node of `kind` with `hook`. A hook for a specific
    /// `JobKind::Leaf(name)` takes precedence over [`Mapper::on_leaves`].
    pub fn on(mut self, kind: JobKind, hook: impl FnMut(Job) -> Job + 'a) -> Self {
        self.hooks.insert(kind, Box::new(hook));
        self
    }

    /// Rewrite every leaf with `hook`.
    pub fn on_leaves(mut self, hook: impl FnMut(Job) -> Job + 'a) -> Self {
        self.leaves = Some(Box::new(hook));
        self
    }

    pub fn map(&mut self, job: &Job) -> Job {
        let rebuilt = job.map_children(|child| self.map(child));
        let kind = rebuilt.kind();
        if let Some(hook) = self.hooks.get_mut(&kind) {
            return hook(rebuilt);
        }
        match (&mut self.leaves, kind) {
            (Some(hook), JobKind::Leaf(_)) => hook(rebuilt),
            _ => rebuilt,
        }
    }
}

/// Rewrite every node of `kind` in `job` with `hook`.
pub fn map_kind<'a>(job: &Job, kind: JobKind, hook: impl FnMut(Job) -> Job + 'a) -> Job {
    Mapper::new().on(kind, hook).map(job)
}

fn is_leaf_in(job: &Job, names: &[&str]) -> bool {
    matches!(job.kind(), JobKind::Leaf(name) if names.contains(&name))
}

/// Force leaves that race a backend to run after a primary leaf finished.
///
/// Repo pagers containing a leaf named in `racing`, and standalone `racing`
/// leaves, are removed from the tree. They are then run sequentially after
/// the first repo pager containing a `primary` leaf or, if there is none,
/// after the first standalone `primary` leaf. When nothing races or nothing
/// primary exists, `job` is returned unchanged.
pub fn order_racing_jobs(job: &Job, racing: &[&str], primary: &[&str]) -> Job {
    let mut collection = Vec::new();

    let without_racing = Mapper::new()
        .on(JobKind::RepoPager, |pager| {
            if pager.has_descendant(|j| is_leaf_in(j, racing)) {
                collection.push(pager);
                return Job::Noop;
            }
            pager
        })
        .map(job);
    let without_racing = Mapper::new()
        .on_leaves(|leaf| {
            if is_leaf_in(&leaf, racing) {
                collection.push(leaf);
                return Job::Noop;
            }
            leaf
        })
        .map(&without_racing);

    if collection.is_empty() {
        return job.clone();
    }

    let mut wrapped = false;
    let sequence_after = |first: Job, collection: &[Job]| {
        let mut children = Vec::with_capacity(collection.len() + 1);
        children.push(first);
        children.extend(collection.iter().cloned());
        Job::sequential(false, children)
    };

    let reordered = Mapper::new()
        .on(JobKind::RepoPager, |pager| {
            if !wrapped && pager.has_descendant(|j| is_leaf_in(j, primary)) {
                wrapped = true;
                return sequence_after(pager, &collection);
            }
            pager
        })
        .map(&without_racing);
    if wrapped {
        return reordered;
    }

    let reordered = Mapper::new()
        .on_leaves(|leaf| {
            if !wrapped && is_leaf_in(&leaf, primary) {
                wrapped = true;
                return sequence_after(leaf, &collection);
            }
            leaf
        })
        .map(&without_racing);
    if wrapped {
        reordered
    } else {
        job.clone()
    }
}
