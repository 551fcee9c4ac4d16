//! Or forwards shared matches live and flushes the rest once at the end.

use std::sync::{Arc, Mutex};

use search_jobs::fakes::{repo_event, StaticLeaf};
use search_jobs::Job;
use search_protocol::fakes::clients;
use search_protocol::{sender_fn, JobContext, SearchEvent};

#[tokio::test]
async fn shared_match_is_forwarded_before_children_complete() {
    let ctx = JobContext::default();
    // (repo id, context already done when it arrived)
    let seen: Arc<Mutex<Vec<(u32, bool)>>> = Arc::default();

    let sender = {
        let seen = Arc::clone(&seen);
        let ctx = ctx.clone();
        sender_fn(move |event: SearchEvent| {
            let mut seen = seen.lock().unwrap();
            for m in &event.results {
                seen.push((m.repo().id.0, ctx.is_done()));
            }
            if event.results.iter().any(|m| m.repo().id.0 == 1) {
                ctx.cancel();
            }
        })
    };

    // Both children block until the context is canceled, which only happens
    // once the shared match has been forwarded.
    let job = Job::or(vec![
        Job::leaf(StaticLeaf::new("a", vec![repo_event(&[1, 2])]).then_wait()),
        Job::leaf(StaticLeaf::new("b", vec![repo_event(&[1, 3])]).then_wait()),
    ]);
    let outcome = job.run(&ctx, &clients(), sender).await;

    assert!(
        outcome.error.is_some_and(|err| err.is_cancelled()),
        "the caller canceled, so the cancellation is reported"
    );
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], (1, false));
    assert_eq!(&seen[1..], &[(2, true), (3, true)]);
}

#[tokio::test]
async fn partial_matches_are_flushed_exactly_once() {
    let job = Job::or(vec![
        Job::leaf(StaticLeaf::new("a", vec![repo_event(&[5]), repo_event(&[5, 4])])),
        Job::leaf(StaticLeaf::new("b", vec![repo_event(&[4, 6])])),
        Job::leaf(StaticLeaf::new("c", vec![repo_event(&[6])])),
    ]);
    let ids: Arc<Mutex<Vec<u32>>> = Arc::default();
    let sender = {
        let ids = Arc::clone(&ids);
        sender_fn(move |event: SearchEvent| {
            ids.lock()
                .unwrap()
                .extend(event.results.iter().map(|m| m.repo().id.0));
        })
    };

    let outcome = job.run(&JobContext::default(), &clients(), sender).await;

    assert!(outcome.is_ok());
    let ids = ids.lock().unwrap().clone();
    assert_eq!(ids, vec![4, 5, 6], "flush is ordered by match identity");
}
