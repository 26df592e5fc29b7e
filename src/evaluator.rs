//! Quota evaluation: the allow/deny decision and its counter update.
//!
//! Each evaluation holds the user's lock from the first read until the updated counter has
//! been durably written, so concurrent evaluations for one user can never both observe
//! "under limit" and over-grant.
//!
//! # Window semantics
//!
//! Windows are hard-reset, not sliding: the first consumption at or after
//! `window_start + window` opens a new window starting *at that moment*. Under sparse usage
//! window starts therefore drift later over time; they are never aligned to a fixed grid.

use crate::accounts::AccountStore;
use crate::clock::{Clock, SystemClock};
use crate::error::QuotaError;
use crate::model::{QuotaCounter, ResourceCategory};
use crate::policy::{PolicyTable, QuotaPolicy};
use crate::store::RecordStore;
use crate::telemetry::{emit_best_effort, NullSink, QuotaEvent, TelemetrySink};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of one evaluation. Both variants are successful results; an exhausted quota is
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The consumption was recorded.
    Allowed {
        category: ResourceCategory,
        /// Count in the current window, including this consumption.
        amount_consumed: u32,
        /// Consumptions still available in the current window.
        remaining: u32,
        /// True when this consumption opened a new window.
        window_reset: bool,
    },
    /// The allowance for the current window is used up. Nothing was recorded.
    LimitExceeded {
        category: ResourceCategory,
        amount_consumed: u32,
        /// Time until the current window expires.
        available_in: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn category(&self) -> ResourceCategory {
        match self {
            Decision::Allowed { category, .. } | Decision::LimitExceeded { category, .. } => {
                *category
            }
        }
    }

    pub fn amount_consumed(&self) -> u32 {
        match self {
            Decision::Allowed { amount_consumed, .. }
            | Decision::LimitExceeded { amount_consumed, .. } => *amount_consumed,
        }
    }

    /// Wait time for a denial, rounded up to whole seconds (`Retry-After` style).
    pub fn available_in_secs(&self) -> Option<u64> {
        match self {
            Decision::LimitExceeded { available_in, .. } => {
                let secs = available_in.as_secs();
                Some(if available_in.subsec_nanos() > 0 { secs + 1 } else { secs })
            }
            Decision::Allowed { .. } => None,
        }
    }
}

/// Result of applying the window algorithm to one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Counter to persist; `None` when the decision is a denial.
    pub next: Option<QuotaCounter>,
    pub decision: Decision,
}

/// Pure window/counter algorithm.
///
/// `elapsed == window` counts as expired.
pub fn assess(
    existing: Option<QuotaCounter>,
    policy: QuotaPolicy,
    category: ResourceCategory,
    now_ms: u64,
) -> Assessment {
    let allowance = policy.allowance();
    let fresh = |now_ms| {
        let counter = QuotaCounter::first(now_ms);
        Assessment {
            next: Some(counter),
            decision: Decision::Allowed {
                category,
                amount_consumed: counter.amount,
                remaining: allowance.saturating_sub(counter.amount),
                window_reset: true,
            },
        }
    };

    let Some(counter) = existing else {
        return fresh(now_ms);
    };

    let elapsed = counter.elapsed(now_ms);
    if elapsed >= policy.window() {
        return fresh(now_ms);
    }

    if counter.amount < allowance {
        let amount = counter.amount + 1;
        return Assessment {
            next: Some(QuotaCounter { amount, window_start_ms: counter.window_start_ms }),
            decision: Decision::Allowed {
                category,
                amount_consumed: amount,
                remaining: allowance - amount,
                window_reset: false,
            },
        };
    }

    Assessment {
        next: None,
        decision: Decision::LimitExceeded {
            category,
            amount_consumed: counter.amount,
            available_in: policy.window() - elapsed,
        },
    }
}

/// Evaluates consumptions against a [`PolicyTable`] and records them in an [`AccountStore`].
///
/// Clones share the same store, policy table, clock and sink.
#[derive(Debug)]
pub struct QuotaEvaluator<S, T = NullSink> {
    store: Arc<AccountStore<S>>,
    policies: Arc<PolicyTable>,
    clock: Arc<dyn Clock>,
    sink: T,
}

impl<S, T: Clone> Clone for QuotaEvaluator<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policies: self.policies.clone(),
            clock: self.clock.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S: RecordStore> QuotaEvaluator<S, NullSink> {
    pub fn new(store: Arc<AccountStore<S>>, policies: Arc<PolicyTable>) -> Self {
        Self { store, policies, clock: Arc::new(SystemClock), sink: NullSink }
    }
}

impl<S, T> QuotaEvaluator<S, T>
where
    S: RecordStore,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Route events to `sink` instead of the current one.
    pub fn with_sink<U>(self, sink: U) -> QuotaEvaluator<S, U>
    where
        U: TelemetrySink,
    {
        QuotaEvaluator { store: self.store, policies: self.policies, clock: self.clock, sink }
    }

    pub fn store(&self) -> &Arc<AccountStore<S>> {
        &self.store
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    /// Decide one consumption of `category` by `user_id` and record it if allowed.
    ///
    /// Errors: `UserNotFound`, `InvalidConfiguration` (no state touched), and the storage
    /// errors of the persist step. A decision is only returned once its write succeeded.
    pub async fn evaluate(
        &self,
        user_id: &str,
        category: ResourceCategory,
    ) -> Result<Decision, QuotaError> {
        let guard = self.store.lock(user_id).await;

        let account = self
            .store
            .get_locked(&guard)
            .await?
            .ok_or_else(|| QuotaError::UserNotFound { user_id: user_id.to_string() })?;
        let policy = self
            .policies
            .lookup(account.tier, category)
            .map_err(|_| QuotaError::InvalidConfiguration { tier: account.tier, category })?;

        let now_ms = self.clock.now_millis();
        let existing = account.counter(category).copied();
        let Assessment { next, decision } = assess(existing, policy, category, now_ms);

        if let Some(counter) = next {
            self.store.update_locked(&guard, category, counter).await?;
        }
        drop(guard);

        debug!(
            target: "tierquota::evaluator",
            user_id,
            tier = %account.tier,
            category = %category,
            allowed = decision.is_allowed(),
            amount = decision.amount_consumed(),
            "quota evaluated"
        );
        self.emit(user_id, existing, &decision).await;
        Ok(decision)
    }

    async fn emit(&self, user_id: &str, previous: Option<QuotaCounter>, decision: &Decision) {
        match *decision {
            Decision::Allowed { category, amount_consumed, remaining, window_reset } => {
                if window_reset {
                    let event = QuotaEvent::WindowReset {
                        user_id: user_id.to_string(),
                        category,
                        previous_amount: previous.map_or(0, |c| c.amount),
                    };
                    emit_best_effort(self.sink.clone(), event).await;
                }
                let event = QuotaEvent::Allowed {
                    user_id: user_id.to_string(),
                    category,
                    amount_consumed,
                    remaining,
                };
                emit_best_effort(self.sink.clone(), event).await;
            }
            Decision::LimitExceeded { category, amount_consumed, available_in } => {
                let event = QuotaEvent::LimitExceeded {
                    user_id: user_id.to_string(),
                    category,
                    amount_consumed,
                    available_in,
                };
                emit_best_effort(self.sink.clone(), event).await;
            }
        }
    }
}
