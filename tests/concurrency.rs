mod common;

use common::fixtures::{evaluator, uniform_table};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tierquota::{MembershipTier, ResourceCategory, UserAccount};

async fn race(allowance: u32, attempts: usize) -> (usize, u32) {
    let (evaluator, _clock) = evaluator(uniform_table(allowance, Duration::from_secs(3_600)));
    evaluator.store().register("shared", MembershipTier::Basic).await.unwrap();
    let evaluator = Arc::new(evaluator);

    let tasks = (0..attempts).map(|_| {
        let evaluator = evaluator.clone();
        tokio::spawn(async move {
            evaluator.evaluate("shared", ResourceCategory::Cappuccino).await.unwrap()
        })
    });
    let allowed = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|d| d.is_allowed())
        .count();

    let raw = evaluator.store().backend().raw("shared").unwrap();
    let persisted: UserAccount = serde_json::from_slice(&raw).unwrap();
    (allowed, persisted.counter(ResourceCategory::Cappuccino).unwrap().amount)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_evaluations_never_over_grant() {
    let (allowed, persisted) = race(5, 40).await;
    assert_eq!(allowed, 5);
    assert_eq!(persisted, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_evaluations_under_allowance_all_pass() {
    let (allowed, persisted) = race(50, 20).await;
    assert_eq!(allowed, 20);
    assert_eq!(persisted, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_users_proceed_independently() {
    let (evaluator, _clock) = evaluator(uniform_table(1, Duration::from_secs(60)));
    for i in 0..16 {
        evaluator.store().register(&format!("user-{i}"), MembershipTier::Basic).await.unwrap();
    }
    let evaluator = Arc::new(evaluator);
    let tasks = (0..16).map(|i| {
        let evaluator = evaluator.clone();
        tokio::spawn(async move {
            evaluator.evaluate(&format!("user-{i}"), ResourceCategory::Espresso).await.unwrap()
        })
    });
    let results = join_all(tasks).await;
    assert!(results.into_iter().all(|r| r.unwrap().is_allowed()));
}
