//! Governance configuration.
//!
//! Loaded from TOML; every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vegov_types::time::{WEEK, YEAR};

use crate::math::BPS;

/// Tunable parameters of the escrow and the reward streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Longest lock a holder may create or extend to, in seconds
    pub max_lock_duration: u64,
    /// Length of the reward distribution window started by each funding, in seconds
    pub reward_duration: u64,
    /// Share of a stake that counts toward rewards without any voting power (basis points)
    pub boost_base_bps: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_lock_duration: 4 * YEAR,
            reward_duration: WEEK,
            boost_base_bps: 4_000,
        }
    }
}

impl GovernanceConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: GovernanceConfig = toml::from_str(contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse governance config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    /// Path is validated to prevent directory traversal.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if path.to_string_lossy().contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("{} ({})", e, path.display()))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_lock_duration == 0 {
            anyhow::bail!("max_lock_duration cannot be 0");
        }
        if self.reward_duration == 0 {
            anyhow::bail!("reward_duration cannot be 0");
        }
        if self.boost_base_bps == 0 || self.boost_base_bps > BPS {
            anyhow::bail!("boost_base_bps must be in 1..={}", BPS);
        }
        Ok(())
    }

    /// Largest boost multiplier a staker can reach, in basis points.
    ///
    /// A fully boosted stake counts at 100% against an unboosted base of
    /// `boost_base_bps`, so the cap is `10000 / base` (2.5x by default).
    pub fn max_boost_bps(&self) -> u64 {
        BPS * BPS / self.boost_base_bps.max(1)
    }
}
