//! Domain types: membership tiers, resource categories and per-user quota state.

use crate::error::QuotaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Membership classification determining quota allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Basic,
    CoffeeLover,
    EspressoManiac,
}

impl MembershipTier {
    /// Every tier, in declaration order.
    pub const ALL: [MembershipTier; 3] =
        [MembershipTier::Basic, MembershipTier::CoffeeLover, MembershipTier::EspressoManiac];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            MembershipTier::Basic => "Basic",
            MembershipTier::CoffeeLover => "Coffee Lover",
            MembershipTier::EspressoManiac => "Espresso Maniac",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MembershipTier {
    type Err = QuotaError;

    /// Accepts labels in any case/separator style (`"Coffee Lover"`, `"coffee_lover"`) and the
    /// legacy 1-based numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "basic" | "1" => Ok(MembershipTier::Basic),
            "coffeelover" | "2" => Ok(MembershipTier::CoffeeLover),
            "espressomaniac" | "3" => Ok(MembershipTier::EspressoManiac),
            _ => Err(QuotaError::InvalidTier(s.to_string())),
        }
    }
}

/// Type of consumable resource being limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Espresso,
    Americano,
    Cappuccino,
}

impl ResourceCategory {
    /// Every category, in declaration order.
    pub const ALL: [ResourceCategory; 3] =
        [ResourceCategory::Espresso, ResourceCategory::Americano, ResourceCategory::Cappuccino];

    pub fn label(self) -> &'static str {
        match self {
            ResourceCategory::Espresso => "Espresso",
            ResourceCategory::Americano => "Americano",
            ResourceCategory::Cappuccino => "Cappuccino",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceCategory {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "espresso" | "1" => Ok(ResourceCategory::Espresso),
            "americano" | "2" => Ok(ResourceCategory::Americano),
            "cappuccino" | "3" => Ok(ResourceCategory::Cappuccino),
            _ => Err(QuotaError::InvalidCategory(s.to_string())),
        }
    }
}

/// User ids double as durable record keys: non-empty, at most 128 bytes, ASCII alphanumerics
/// plus `-`, `_`, `.`, `@`, and never a bare `.` or `..`.
pub fn validate_user_id(user_id: &str) -> Result<(), QuotaError> {
    let well_formed = !user_id.is_empty()
        && user_id.len() <= 128
        && user_id != "."
        && user_id != ".."
        && user_id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if well_formed {
        Ok(())
    } else {
        Err(QuotaError::InvalidUserId(user_id.to_string()))
    }
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Consumption inside the current window for one (user, category).
///
/// `amount` counts consumptions in `[window_start_ms, window_start_ms + window)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaCounter {
    pub amount: u32,
    /// Wall-clock start of the window, milliseconds since the Unix epoch.
    pub window_start_ms: u64,
}

impl QuotaCounter {
    /// Counter for the first consumption of a fresh window.
    pub fn first(now_ms: u64) -> Self {
        Self { amount: 1, window_start_ms: now_ms }
    }

    /// Time since the window opened; saturates to zero if the clock moved backwards.
    pub fn elapsed(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.window_start_ms))
    }
}

/// A registered user: tier plus lazily created per-category counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub tier: MembershipTier,
    #[serde(default)]
    pub quota_state: BTreeMap<ResourceCategory, QuotaCounter>,
}

impl UserAccount {
    pub fn new(tier: MembershipTier) -> Self {
        Self { tier, quota_state: BTreeMap::new() }
    }

    pub fn counter(&self, category: ResourceCategory) -> Option<&QuotaCounter> {
        self.quota_state.get(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_labels_and_codes() {
        assert_eq!("Coffee Lover".parse::<MembershipTier>().unwrap(), MembershipTier::CoffeeLover);
        assert_eq!("espresso_maniac".parse::<MembershipTier>().unwrap(), MembershipTier::EspressoManiac);
        assert_eq!(" BASIC ".parse::<MembershipTier>().unwrap(), MembershipTier::Basic);
        assert_eq!("3".parse::<MembershipTier>().unwrap(), MembershipTier::EspressoManiac);
        assert!(matches!("0".parse::<MembershipTier>(), Err(QuotaError::InvalidTier(_))));
        assert!(matches!("gold".parse::<MembershipTier>(), Err(QuotaError::InvalidTier(_))));
    }

    #[test]
    fn category_rejects_unknown_values() {
        assert_eq!("cappuccino".parse::<ResourceCategory>().unwrap(), ResourceCategory::Cappuccino);
        assert!(matches!("latte".parse::<ResourceCategory>(), Err(QuotaError::InvalidCategory(_))));
        assert!(matches!("".parse::<ResourceCategory>(), Err(QuotaError::InvalidCategory(_))));
    }

    #[test]
    fn user_id_validation() {
        validate_user_id("alice").unwrap();
        validate_user_id("bob.smith@example.com").unwrap();
        validate_user_id("u-1_2").unwrap();
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id("../etc/passwd").is_err());
        assert!(validate_user_id("a b").is_err());
        assert!(validate_user_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn display_matches_labels() {
        assert_eq!(MembershipTier::EspressoManiac.to_string(), "Espresso Maniac");
        assert_eq!(ResourceCategory::Americano.to_string(), "Americano");
    }

    #[test]
    fn account_record_shape() {
        let mut account = UserAccount::new(MembershipTier::CoffeeLover);
        account.quota_state.insert(ResourceCategory::Espresso, QuotaCounter::first(1_000));
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["tier"], "coffee_lover");
        assert_eq!(json["quota_state"]["espresso"]["amount"], 1);
        assert_eq!(json["quota_state"]["espresso"]["window_start_ms"], 1_000);
    }

    #[test]
    fn record_without_quota_state_decodes_empty() {
        let account: UserAccount = serde_json::from_str(r#"{"tier":"basic"}"#).unwrap();
        assert!(account.quota_state.is_empty());
    }

    #[test]
    fn elapsed_saturates_on_clock_skew() {
        let counter = QuotaCounter::first(5_000);
        assert_eq!(counter.elapsed(4_000), Duration::ZERO);
        assert_eq!(counter.elapsed(7_500), Duration::from_millis(2_500));
    }
}
