//! Structured quota events and the sinks that consume them.
//!
//! The evaluator and the service facade emit a [`QuotaEvent`] for every registration,
//! decision and store reset. Events flow through [`TelemetrySink`] implementations, which are
//! plain `tower::Service<QuotaEvent>` values, so sinks compose with ordinary tower tooling.
//!
//! Emission is best-effort: a sink that is not ready or fails never affects the decision
//! returned to the caller.

pub mod events;
pub mod sinks;

pub use events::QuotaEvent;
#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
