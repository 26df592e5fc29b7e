#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tierquota::{
    AccountStore, InMemoryRecordStore, ManualClock, MembershipTier, PolicyTable, QuotaEvaluator,
    ResourceCategory,
};

pub type MemEvaluator = QuotaEvaluator<InMemoryRecordStore>;

/// Table granting `allowance` per `window` for every tier/category pair.
pub fn uniform_table(allowance: u32, window: Duration) -> PolicyTable {
    let mut builder = PolicyTable::builder();
    for tier in MembershipTier::ALL {
        for category in ResourceCategory::ALL {
            builder = builder.policy(tier, category, allowance, window);
        }
    }
    builder.build_complete().expect("uniform table")
}

/// In-memory evaluator on a manual clock starting at zero.
pub fn evaluator(table: PolicyTable) -> (MemEvaluator, ManualClock) {
    let clock = ManualClock::new(0);
    let store = Arc::new(AccountStore::new(InMemoryRecordStore::new()));
    let evaluator = QuotaEvaluator::new(store, Arc::new(table)).with_clock(clock.clone());
    (evaluator, clock)
}
