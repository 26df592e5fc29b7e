//! Quota policy table: tier × category → (allowance, window).
//!
//! The table is built once, validated, and then shared immutably (usually behind an `Arc`)
//! with the evaluator. There is no process-wide mutable configuration.

use crate::model::{MembershipTier, ResourceCategory};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Allowance and window for one (tier, category) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    allowance: u32,
    window: Duration,
}

impl QuotaPolicy {
    /// Both values must be non-zero.
    pub fn new(allowance: u32, window: Duration) -> Result<Self, PolicyError> {
        if allowance == 0 {
            return Err(PolicyError::InvalidAllowance);
        }
        if window.is_zero() {
            return Err(PolicyError::InvalidWindow);
        }
        Ok(Self { allowance, window })
    }

    /// Maximum consumptions inside one window.
    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    /// Length of the counting window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Errors produced while building or querying a [`PolicyTable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("allowance must be > 0")]
    InvalidAllowance,
    #[error("window must be > 0")]
    InvalidWindow,
    #[error("policy for {tier} / {category} defined twice")]
    Duplicate { tier: MembershipTier, category: ResourceCategory },
    #[error("no policy for {tier} / {category}")]
    Missing { tier: MembershipTier, category: ResourceCategory },
    #[error("policy table leaves {} tier/category pairs unconfigured", .0.len())]
    Incomplete(Vec<(MembershipTier, ResourceCategory)>),
}

/// Immutable mapping from (tier, category) to [`QuotaPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    entries: HashMap<(MembershipTier, ResourceCategory), QuotaPolicy>,
}

impl PolicyTable {
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// The shop's stock configuration.
    ///
    /// | tier            | Espresso | Americano | Cappuccino |
    /// |-----------------|----------|-----------|------------|
    /// | Basic           | 1 / 24h  | 2 / 24h   | 3 / 24h    |
    /// | Coffee Lover    | 5 / 24h  | 5 / 24h   | 5 / 24h    |
    /// | Espresso Maniac | 5 / 1h   | 2 / 24h   | 3 / 24h    |
    pub fn default_table() -> Self {
        use MembershipTier::*;
        use ResourceCategory::*;

        let rows = [
            (Basic, Espresso, 1, DAY),
            (Basic, Americano, 2, DAY),
            (Basic, Cappuccino, 3, DAY),
            (CoffeeLover, Espresso, 5, DAY),
            (CoffeeLover, Americano, 5, DAY),
            (CoffeeLover, Cappuccino, 5, DAY),
            (EspressoManiac, Espresso, 5, HOUR),
            (EspressoManiac, Americano, 2, DAY),
            (EspressoManiac, Cappuccino, 3, DAY),
        ];
        let entries = rows
            .into_iter()
            .map(|(tier, category, allowance, window)| {
                ((tier, category), QuotaPolicy { allowance, window })
            })
            .collect();
        Self { entries }
    }

    /// Resolve the policy for a pair.
    pub fn lookup(
        &self,
        tier: MembershipTier,
        category: ResourceCategory,
    ) -> Result<QuotaPolicy, PolicyError> {
        self.entries
            .get(&(tier, category))
            .copied()
            .ok_or(PolicyError::Missing { tier, category })
    }

    /// Eager check that every enumerated pair is configured.
    pub fn validate_coverage(&self) -> Result<(), PolicyError> {
        let missing: Vec<_> = MembershipTier::ALL
            .iter()
            .flat_map(|t| ResourceCategory::ALL.iter().map(move |c| (*t, *c)))
            .filter(|pair| !self.entries.contains_key(pair))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Incomplete(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by tier then category.
    pub fn entries(&self) -> Vec<(MembershipTier, ResourceCategory, QuotaPolicy)> {
        let mut out: Vec<_> = self.entries.iter().map(|(&(t, c), p)| (t, c, *p)).collect();
        out.sort_by_key(|(t, c, _)| (*t, *c));
        out
    }

    /// Emit one `info` line per configured policy.
    pub fn log_summary(&self) {
        for (tier, category, policy) in self.entries() {
            info!(
                target: "tierquota::policy",
                tier = %tier,
                category = %category,
                allowance = policy.allowance,
                window = %format_duration(policy.window),
                "{} {} in last {}",
                policy.allowance,
                category,
                format_duration(policy.window)
            );
        }
    }
}

impl fmt::Display for PolicyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = None;
        for (tier, category, policy) in self.entries() {
            if current != Some(tier) {
                writeln!(f, "Membership \"{tier}\"")?;
                current = Some(tier);
            }
            writeln!(f, "{} {} in last {}", policy.allowance, category, format_duration(policy.window))?;
        }
        Ok(())
    }
}

/// Builder that rejects invalid and duplicate entries as they are added.
#[derive(Debug, Default)]
pub struct PolicyTableBuilder {
    entries: HashMap<(MembershipTier, ResourceCategory), QuotaPolicy>,
    error: Option<PolicyError>,
}

impl PolicyTableBuilder {
    pub fn policy(
        mut self,
        tier: MembershipTier,
        category: ResourceCategory,
        allowance: u32,
        window: Duration,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match QuotaPolicy::new(allowance, window) {
            Ok(policy) => {
                if self.entries.insert((tier, category), policy).is_some() {
                    self.error = Some(PolicyError::Duplicate { tier, category });
                }
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Finish without a coverage check; missing pairs surface at evaluation time.
    pub fn build(self) -> Result<PolicyTable, PolicyError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(PolicyTable { entries: self.entries }),
        }
    }

    /// Finish and require every tier/category pair to be configured.
    pub fn build_complete(self) -> Result<PolicyTable, PolicyError> {
        let table = self.build()?;
        table.validate_coverage()?;
        Ok(table)
    }
}

/// Compact duration rendering: `24h`, `1h30m`, `5s`, `250ms`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    if total == 0 {
        return format!("{}ms", d.as_millis());
    }
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{s}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MembershipTier::*;
    use crate::model::ResourceCategory::*;

    #[test]
    fn default_table_matches_stock_configuration() {
        let table = PolicyTable::default_table();
        assert_eq!(table.len(), 9);
        table.validate_coverage().unwrap();

        let maniac = table.lookup(EspressoManiac, Espresso).unwrap();
        assert_eq!(maniac.allowance(), 5);
        assert_eq!(maniac.window(), HOUR);

        let basic = table.lookup(Basic, Cappuccino).unwrap();
        assert_eq!(basic.allowance(), 3);
        assert_eq!(basic.window(), DAY);
    }

    #[test]
    fn lookup_reports_missing_pair() {
        let table = PolicyTable::builder()
            .policy(Basic, Espresso, 1, Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(
            table.lookup(Basic, Americano),
            Err(PolicyError::Missing { tier: Basic, category: Americano })
        );
    }

    #[test]
    fn builder_rejects_zero_values_and_duplicates() {
        let zero = PolicyTable::builder().policy(Basic, Espresso, 0, DAY).build();
        assert_eq!(zero, Err(PolicyError::InvalidAllowance));

        let no_window = PolicyTable::builder().policy(Basic, Espresso, 1, Duration::ZERO).build();
        assert_eq!(no_window, Err(PolicyError::InvalidWindow));

        let dup = PolicyTable::builder()
            .policy(Basic, Espresso, 1, DAY)
            .policy(Basic, Espresso, 2, DAY)
            .build();
        assert_eq!(dup, Err(PolicyError::Duplicate { tier: Basic, category: Espresso }));
    }

    #[test]
    fn build_complete_lists_gaps() {
        let err = PolicyTable::builder()
            .policy(Basic, Espresso, 1, DAY)
            .build_complete()
            .unwrap_err();
        match err {
            PolicyError::Incomplete(missing) => {
                assert_eq!(missing.len(), 8);
                assert!(!missing.contains(&(Basic, Espresso)));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn display_groups_by_tier() {
        let rendered = PolicyTable::default_table().to_string();
        assert!(rendered.contains("Membership \"Espresso Maniac\""));
        assert!(rendered.contains("5 Espresso in last 1h"));
        assert!(rendered.contains("1 Espresso in last 24h"));
    }

    #[test]
    fn format_duration_renders_compact_units() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(DAY), "24h");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m1s");
    }
}
