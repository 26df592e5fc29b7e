#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # tierquota
//!
//! Per-user, per-category consumption quotas over rolling windows, with durable per-user
//! records and tiered policies.
//!
//! ## Features
//!
//! - **Tiered policies**: an immutable table of (membership tier, category) → allowance/window
//! - **Hard-reset windows**: a window restarts at the first consumption after it expires
//! - **Durable records**: one JSON document per user, written before the cache changes
//! - **Per-user serialization**: a sharded lock table keeps concurrent evaluations exact
//! - **Telemetry**: structured [`QuotaEvent`]s delivered to tower-service sinks
//! - **Tower middleware**: [`QuotaLayer`] gates any service on the caller's quota
//!
//! ## Quick Start
//!
//! ```rust
//! use tierquota::{InMemoryRecordStore, Outcome, QuotaService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tierquota::QuotaError> {
//!     let service = QuotaService::with_defaults(InMemoryRecordStore::new());
//!     service.register_user("alice", "basic").await?;
//!
//!     let first = service.evaluate("alice", "espresso").await?;
//!     assert!(first.is_allowed());
//!
//!     let second = service.evaluate("alice", "espresso").await?;
//!     assert!(matches!(second, Outcome::LimitExceeded { amount_consumed: 1, .. }));
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod locks;
pub mod middleware;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;
pub mod telemetry;

// Re-exports
pub use accounts::{AccountStore, UserGuard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CategoryQuota, ConfigError, QuotaConfig, TierQuotas};
pub use error::QuotaError;
pub use evaluator::{assess, Assessment, Decision, QuotaEvaluator};
pub use locks::{ShardedLocks, DEFAULT_SHARDS};
pub use middleware::{QuotaGate, QuotaGateError, QuotaLayer, QuotaSubject};
pub use model::{MembershipTier, QuotaCounter, ResourceCategory, UserAccount};
pub use policy::{PolicyError, PolicyTable, PolicyTableBuilder, QuotaPolicy};
pub use service::{Outcome, QuotaService};
pub use store::{FileRecordStore, InMemoryRecordStore, RecordStore};
pub use telemetry::{LogSink, MemorySink, NullSink, QuotaEvent, TelemetrySink};
