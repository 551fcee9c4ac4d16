//! Smart constructors collapse trivial combinators.

use std::time::Duration;

use search_jobs::fakes::StaticLeaf;
use search_jobs::Job;
use search_protocol::SelectPath;

fn leaf() -> Job {
    Job::leaf(StaticLeaf::new("zoekt", vec![]))
}

#[test]
fn empty_combinators_are_noop() {
    assert_eq!(Job::parallel(vec![]), Job::noop());
    assert_eq!(Job::sequential(true, vec![]), Job::noop());
    assert_eq!(Job::and(vec![]), Job::noop());
    assert_eq!(Job::or(vec![]), Job::noop());
}

#[test]
fn single_child_combinators_are_the_child() {
    let j = leaf();
    assert_eq!(Job::parallel(vec![j.clone()]), j);
    assert_eq!(Job::sequential(false, vec![j.clone()]), j);
    assert_eq!(Job::and(vec![j.clone()]), j);
    assert_eq!(Job::or(vec![j.clone()]), j);
}

#[test]
fn wrappers_around_noop_are_noop() {
    assert!(Job::limit(5, Job::noop()).is_noop());
    assert!(Job::timeout(Duration::from_secs(1), Job::noop()).is_noop());
    assert!(Job::select(SelectPath::Repository, Job::noop()).is_noop());
    assert!(Job::sub_repo_perms_filter(Job::noop()).is_noop());
    assert!(Job::sanitize(vec![], Job::noop()).is_noop());
    assert_eq!(Job::priority(leaf(), Job::noop()).kind(), leaf().kind());
}

#[test]
fn distinct_leaves_are_not_equal() {
    assert_ne!(leaf(), leaf());
    assert_eq!(Job::parallel(vec![leaf(), leaf()]).children().len(), 2);
}
