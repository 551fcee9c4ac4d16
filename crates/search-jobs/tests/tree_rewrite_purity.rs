//! Rewriting a template never touches the template or earlier rewrites.

use search_jobs::fakes::{RepoSubsetLeaf, StaticLeaf};
use search_jobs::{map_kind, Job, JobKind, PartialJob, ReposPartialJob};
use search_protocol::fakes::clients;
use search_protocol::{AggregatingSender, JobContext, MinimalRepo, RepositoryRevisions, ResolvedRepos};

fn repos(ids: &[u32]) -> ResolvedRepos {
    ResolvedRepos::unpartitioned(
        ids.iter()
            .map(|id| RepositoryRevisions::head(MinimalRepo::new(*id, &format!("repo{id}"))))
            .collect(),
    )
}

async fn run_ids(job: &Job) -> Vec<u32> {
    let agg = AggregatingSender::new();
    let outcome = job.run(&JobContext::default(), &clients(), agg.clone()).await;
    assert!(outcome.is_ok());
    let mut ids: Vec<_> = agg.results().iter().map(|m| m.repo().id.0).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn two_resolutions_are_independent() {
    let template = Job::parallel(vec![
        Job::limit(10, Job::leaf(RepoSubsetLeaf::new("zoekt_repos"))),
        Job::leaf(RepoSubsetLeaf::new("searcher")),
    ]);
    let partial = ReposPartialJob::new(template.clone());

    let first = partial.resolve(&repos(&[1]));
    let second = partial.resolve(&repos(&[2, 3]));

    assert_eq!(run_ids(&first).await, vec![1, 1]);
    assert_eq!(run_ids(&second).await, vec![2, 2, 3, 3]);
    assert_eq!(run_ids(&first).await, vec![1, 1]);
    assert!(run_ids(partial.template()).await.is_empty());
    assert_eq!(partial.template(), &template);
}

#[test]
fn map_kind_returns_a_new_tree() {
    let original = Job::parallel(vec![
        Job::limit(5, Job::leaf(StaticLeaf::new("a", vec![]))),
        Job::leaf(StaticLeaf::new("b", vec![])),
    ]);
    let snapshot = original.clone();
    let rewritten = map_kind(&original, JobKind::Limit, |job| Job::limit(1, job));

    assert_eq!(original, snapshot);
    assert_ne!(rewritten, original);
    assert_eq!(rewritten.children()[0].children()[0].kind(), JobKind::Limit);
}
