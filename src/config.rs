//! Startup configuration loaded from JSON.
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "lock_shards": 64,
//!   "policies": [
//!     { "tier": "basic", "quotas": [ { "category": "espresso", "allowance": 1, "window_secs": 86400 } ] }
//!   ]
//! }
//! ```
//!
//! `policies` is optional; when absent the stock table is used. When present it must cover
//! every tier/category pair.

use crate::locks::DEFAULT_SHARDS;
use crate::model::{MembershipTier, ResourceCategory};
use crate::policy::{PolicyError, PolicyTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid policy table: {0}")]
    Policy(#[from] PolicyError),
    #[error("lock_shards must be > 0")]
    InvalidShardCount,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Directory holding one JSON record per user.
    pub data_dir: PathBuf,
    /// Size of the per-user lock table.
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,
    /// Custom policy table; `None` selects the stock defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<TierQuotas>>,
}

/// All quotas for one membership tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuotas {
    pub tier: MembershipTier,
    pub quotas: Vec<CategoryQuota>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryQuota {
    pub category: ResourceCategory,
    pub allowance: u32,
    pub window_secs: u64,
}

fn default_lock_shards() -> usize {
    DEFAULT_SHARDS
}

impl QuotaConfig {
    /// Defaults with the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), lock_shards: DEFAULT_SHARDS, policies: None }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&json)
    }

    /// Check shard count and, when custom policies are given, full coverage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_shards == 0 {
            return Err(ConfigError::InvalidShardCount);
        }
        self.policy_table()?;
        Ok(())
    }

    /// Build the policy table this config describes.
    pub fn policy_table(&self) -> Result<PolicyTable, ConfigError> {
        let Some(tiers) = &self.policies else {
            return Ok(PolicyTable::default_table());
        };
        let mut builder = PolicyTable::builder();
        for tier in tiers {
            for quota in &tier.quotas {
                builder = builder.policy(
                    tier.tier,
                    quota.category,
                    quota.allowance,
                    Duration::from_secs(quota.window_secs),
                );
            }
        }
        Ok(builder.build_complete()?)
    }
}
