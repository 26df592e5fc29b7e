use crate::model::{MembershipTier, ResourceCategory};
use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Events emitted while registering users and evaluating quotas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaEvent {
    /// A new account was created.
    Registered { user_id: String, tier: MembershipTier },
    /// A consumption was granted inside the current window.
    Allowed {
        user_id: String,
        category: ResourceCategory,
        /// Count after this consumption.
        amount_consumed: u32,
        /// Consumptions still available in the window.
        remaining: u32,
    },
    /// A consumption opened a fresh window (first use, or the previous window expired).
    WindowReset {
        user_id: String,
        category: ResourceCategory,
        /// Amount recorded in the window that just closed; zero on first use.
        previous_amount: u32,
    },
    /// The allowance for the active window is used up.
    LimitExceeded {
        user_id: String,
        category: ResourceCategory,
        amount_consumed: u32,
        available_in: Duration,
    },
    /// Every account and durable record was discarded.
    StoreReset,
}

impl QuotaEvent {
    /// Short machine-friendly name.
    pub fn kind(&self) -> &'static str {
        match self {
            QuotaEvent::Registered { .. } => "registered",
            QuotaEvent::Allowed { .. } => "allowed",
            QuotaEvent::WindowReset { .. } => "window_reset",
            QuotaEvent::LimitExceeded { .. } => "limit_exceeded",
            QuotaEvent::StoreReset => "store_reset",
        }
    }
}

impl fmt::Display for QuotaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaEvent::Registered { user_id, tier } => {
                write!(f, "Registered(user={}, tier={})", user_id, tier)
            }
            QuotaEvent::Allowed { user_id, category, amount_consumed, remaining } => write!(
                f,
                "Allowed(user={}, {}={}, remaining={})",
                user_id, category, amount_consumed, remaining
            ),
            QuotaEvent::WindowReset { user_id, category, previous_amount } => write!(
                f,
                "WindowReset(user={}, {}, previous={})",
                user_id, category, previous_amount
            ),
            QuotaEvent::LimitExceeded { user_id, category, amount_consumed, available_in } => {
                write!(
                    f,
                    "LimitExceeded(user={}, {}={}, available_in={:?})",
                    user_id, category, amount_consumed, available_in
                )
            }
            QuotaEvent::StoreReset => write!(f, "StoreReset"),
        }
    }
}

#[cfg_attr(not(feature = "telemetry-json"), allow(dead_code))]
#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a QuotaEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &QuotaEvent) -> serde_json::Value {
    match event {
        QuotaEvent::Registered { user_id, tier } => json!({
            "kind": event.kind(),
            "user_id": user_id,
            "tier": tier,
        }),
        QuotaEvent::Allowed { user_id, category, amount_consumed, remaining } => json!({
            "kind": event.kind(),
            "user_id": user_id,
            "category": category,
            "amount_consumed": *amount_consumed,
            "remaining": *remaining,
        }),
        QuotaEvent::WindowReset { user_id, category, previous_amount } => json!({
            "kind": event.kind(),
            "user_id": user_id,
            "category": category,
            "previous_amount": *previous_amount,
        }),
        QuotaEvent::LimitExceeded { user_id, category, amount_consumed, available_in } => json!({
            "kind": event.kind(),
            "user_id": user_id,
            "category": category,
            "amount_consumed": *amount_consumed,
            "available_in_ms": clamp_u64(available_in.as_millis()),
        }),
        QuotaEvent::StoreReset => json!({ "kind": event.kind() }),
    }
}
