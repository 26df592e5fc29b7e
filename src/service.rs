//! Boundary facade taking raw strings, as a transport handler would receive them.
//!
//! Input is parsed into the closed enums here; anything that does not parse is rejected
//! before the core is touched. Evaluation results are classified into an [`Outcome`] so a
//! transport can map each case to its own status without inspecting error variants.

use crate::accounts::AccountStore;
use crate::config::{ConfigError, QuotaConfig};
use crate::error::QuotaError;
use crate::evaluator::{Decision, QuotaEvaluator};
use crate::model::{validate_user_id, MembershipTier, ResourceCategory, UserAccount};
use crate::policy::{format_duration, PolicyTable};
use crate::store::{FileRecordStore, RecordStore};
use crate::telemetry::{emit_best_effort, NullSink, QuotaEvent, TelemetrySink};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Classified result of [`QuotaService::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allowed { category: ResourceCategory, amount_consumed: u32, remaining: u32 },
    LimitExceeded { category: ResourceCategory, amount_consumed: u32, available_in_secs: u64 },
    UserNotFound { user_id: String },
    InvalidConfiguration { tier: MembershipTier, category: ResourceCategory },
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed { .. })
    }

    /// Human-readable description addressed to `user_id`.
    pub fn message(&self, user_id: &str) -> String {
        match self {
            Outcome::Allowed { category, amount_consumed, remaining } => format!(
                "User {user_id} bought {category}: {amount_consumed} in current window, {remaining} left"
            ),
            Outcome::LimitExceeded { category, amount_consumed, available_in_secs } => format!(
                "User {user_id} limit exceeded, {category} bought: {amount_consumed} available in {}",
                format_duration(Duration::from_secs(*available_in_secs))
            ),
            Outcome::UserNotFound { user_id } => format!("user not found {user_id}"),
            Outcome::InvalidConfiguration { tier, category } => {
                format!("no quota configured for {category} with membership {tier}")
            }
        }
    }
}

impl From<Decision> for Outcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allowed { category, amount_consumed, remaining, .. } => {
                Outcome::Allowed { category, amount_consumed, remaining }
            }
            Decision::LimitExceeded { category, amount_consumed, .. } => Outcome::LimitExceeded {
                category,
                amount_consumed,
                available_in_secs: decision.available_in_secs().unwrap_or_default(),
            },
        }
    }
}

/// Registration, evaluation and reset over one store and policy table.
#[derive(Debug)]
pub struct QuotaService<S, T = NullSink> {
    evaluator: QuotaEvaluator<S, T>,
}

impl<S, T: Clone> Clone for QuotaService<S, T> {
    fn clone(&self) -> Self {
        Self { evaluator: self.evaluator.clone() }
    }
}

impl QuotaService<FileRecordStore> {
    /// Open the data directory and policy table described by `config`.
    pub async fn from_config(config: &QuotaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policies = config.policy_table()?;
        let backend = FileRecordStore::open(&config.data_dir)
            .await
            .map_err(|source| ConfigError::Io { path: config.data_dir.clone(), source })?;
        let store = AccountStore::with_shards(backend, config.lock_shards);
        policies.log_summary();
        Ok(Self::new(QuotaEvaluator::new(Arc::new(store), Arc::new(policies))))
    }
}

impl<S: RecordStore> QuotaService<S, NullSink> {
    /// Service over `backend` with the stock policy table.
    pub fn with_defaults(backend: S) -> Self {
        let store = Arc::new(AccountStore::new(backend));
        Self::new(QuotaEvaluator::new(store, Arc::new(PolicyTable::default_table())))
    }
}

impl<S, T> QuotaService<S, T>
where
    S: RecordStore,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    pub fn new(evaluator: QuotaEvaluator<S, T>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &QuotaEvaluator<S, T> {
        &self.evaluator
    }

    pub fn store(&self) -> &Arc<AccountStore<S>> {
        self.evaluator.store()
    }

    /// Register `user_id` with the tier named by `tier`.
    pub async fn register_user(&self, user_id: &str, tier: &str) -> Result<UserAccount, QuotaError> {
        validate_user_id(user_id)?;
        let tier: MembershipTier = tier.parse()?;
        let account = self.store().register(user_id, tier).await?;
        let event = QuotaEvent::Registered { user_id: user_id.to_string(), tier };
        emit_best_effort(self.evaluator.sink().clone(), event).await;
        Ok(account)
    }

    /// Evaluate one consumption of the category named by `category`.
    ///
    /// Unknown users and missing policies are outcomes; malformed input and storage failures
    /// are errors.
    pub async fn evaluate(&self, user_id: &str, category: &str) -> Result<Outcome, QuotaError> {
        validate_user_id(user_id)?;
        let category: ResourceCategory = category.parse()?;
        match self.evaluator.evaluate(user_id, category).await {
            Ok(decision) => Ok(decision.into()),
            Err(QuotaError::UserNotFound { user_id }) => Ok(Outcome::UserNotFound { user_id }),
            Err(QuotaError::InvalidConfiguration { tier, category }) => {
                Ok(Outcome::InvalidConfiguration { tier, category })
            }
            Err(e) => Err(e),
        }
    }

    /// Discard every account and durable record.
    pub async fn reset_all(&self) -> Result<(), QuotaError> {
        self.store().reset().await?;
        emit_best_effort(self.evaluator.sink().clone(), QuotaEvent::StoreReset).await;
        info!(target: "tierquota::service", "all quota state cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    #[test]
    fn limit_message_matches_shop_wording() {
        let outcome = Outcome::LimitExceeded {
            category: ResourceCategory::Espresso,
            amount_consumed: 1,
            available_in_secs: 5,
        };
        assert_eq!(outcome.message("u"), "User u limit exceeded, Espresso bought: 1 available in 5s");

        let day = Outcome::LimitExceeded {
            category: ResourceCategory::Americano,
            amount_consumed: 2,
            available_in_secs: 86_400,
        };
        assert!(day.message("v").ends_with("available in 24h"));
    }

    #[test]
    fn denial_rounds_wait_up_to_whole_seconds() {
        let decision = Decision::LimitExceeded {
            category: ResourceCategory::Cappuccino,
            amount_consumed: 3,
            available_in: Duration::from_millis(4_001),
        };
        assert_eq!(
            Outcome::from(decision),
            Outcome::LimitExceeded {
                category: ResourceCategory::Cappuccino,
                amount_consumed: 3,
                available_in_secs: 5
            }
        );
    }

    #[tokio::test]
    async fn rejects_malformed_input_before_touching_state() {
        let service = QuotaService::with_defaults(InMemoryRecordStore::new());
        assert!(matches!(
            service.register_user("u", "platinum").await,
            Err(QuotaError::InvalidTier(_))
        ));
        assert!(matches!(
            service.register_user("a/b", "basic").await,
            Err(QuotaError::InvalidUserId(_))
        ));
        service.register_user("u", "Coffee Lover").await.unwrap();
        assert!(matches!(service.evaluate("u", "mocha").await, Err(QuotaError::InvalidCategory(_))));
        assert_eq!(service.store().backend().len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_an_outcome() {
        let service = QuotaService::with_defaults(InMemoryRecordStore::new());
        let outcome = service.evaluate("nobody", "espresso").await.unwrap();
        assert_eq!(outcome, Outcome::UserNotFound { user_id: "nobody".into() });
        assert!(service.store().backend().is_empty());
    }
}
