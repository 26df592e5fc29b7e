use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tierquota::{
    assess, AccountStore, InMemoryRecordStore, ManualClock, MembershipTier, PolicyTable,
    QuotaCounter, QuotaEvaluator, QuotaPolicy, ResourceCategory,
};

use std::sync::Arc;
use std::time::Duration;

fn assess_pure(c: &mut Criterion) {
    let policy = QuotaPolicy::new(5, Duration::from_secs(3_600)).unwrap();
    let counter = QuotaCounter { amount: 3, window_start_ms: 0 };

    c.bench_function("assess_inside_window", |b| {
        b.iter(|| {
            black_box(assess(
                black_box(Some(counter)),
                policy,
                ResourceCategory::Espresso,
                black_box(1_000),
            ))
        });
    });
}

fn evaluate_denied_hot_path(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(AccountStore::new(InMemoryRecordStore::new()));
    rt.block_on(store.register("bench", MembershipTier::Basic)).unwrap();
    let evaluator = QuotaEvaluator::new(store, Arc::new(PolicyTable::default_table()))
        .with_clock(ManualClock::new(0));
    // Exhaust the allowance so every iteration is a read-only denial.
    rt.block_on(evaluator.evaluate("bench", ResourceCategory::Espresso)).unwrap();

    c.bench_function("evaluate_denied", |b| {
        let evaluator = &evaluator;
        b.to_async(&rt).iter(|| async move {
            let _ = black_box(evaluator.evaluate("bench", ResourceCategory::Espresso).await);
        });
    });
}

fn evaluate_allowed_with_write(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let clock = ManualClock::new(0);
    let store = Arc::new(AccountStore::new(InMemoryRecordStore::new()));
    rt.block_on(store.register("bench", MembershipTier::CoffeeLover)).unwrap();
    let evaluator = QuotaEvaluator::new(store, Arc::new(PolicyTable::default_table()))
        .with_clock(clock.clone());
    let day = Duration::from_secs(24 * 3_600);

    c.bench_function("evaluate_allowed_persist", |b| {
        b.to_async(&rt).iter(|| {
            // Jump past the window so each call opens a fresh one and persists.
            clock.advance(day);
            let evaluator = &evaluator;
            async move {
                let _ = black_box(evaluator.evaluate("bench", ResourceCategory::Americano).await);
            }
        });
    });
}

criterion_group!(benches, assess_pure, evaluate_denied_hot_path, evaluate_allowed_with_write);
criterion_main!(benches);
