//! Protocol parameters shared by every component of a chain.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XIntentError};
use crate::types::Amount;

/// One unit of an 18-decimal token.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Longest configurable time window (deadline horizon, price staleness):
/// one hundred years, in seconds.
pub const MAX_WINDOW_SECS: i64 = 100 * 365 * 86_400;

/// Tunable protocol constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Minimum distance between creation time and an intent's deadline, in seconds.
    pub min_deadline_horizon_secs: i64,

    /// Reputation assigned to newly registered agents.
    pub baseline_reputation: u64,

    /// Reputation removed per slash.
    pub slash_penalty: u64,

    /// Minimum stake required to register an agent.
    pub min_stake: Amount,

    /// Upper bound for any configured slippage tolerance, in basis points.
    pub max_slippage_bps: u16,

    /// Slippage applied by the execution proxy unless reconfigured.
    pub default_slippage_bps: u16,

    /// Price age beyond which a reading is treated as unavailable, in seconds.
    pub default_price_staleness_secs: i64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_deadline_horizon_secs: 3600,
            baseline_reputation: 1000,
            slash_penalty: 100,
            min_stake: UNIT,
            max_slippage_bps: 1000,
            default_slippage_bps: 50,
            default_price_staleness_secs: 3600,
        }
    }
}

impl ProtocolParams {
    /// Set the minimum stake.
    pub fn with_min_stake(mut self, min_stake: Amount) -> Self {
        self.min_stake = min_stake;
        self
    }

    /// Set the minimum deadline horizon.
    pub fn with_min_deadline_horizon(mut self, secs: i64) -> Self {
        self.min_deadline_horizon_secs = secs;
        self
    }

    pub fn min_deadline_horizon(&self) -> Result<Duration> {
        window("deadline horizon", self.min_deadline_horizon_secs, 0)
    }

    /// Reject windows outside `MAX_WINDOW_SECS` and slippage above its cap.
    pub fn validate(&self) -> Result<()> {
        window("deadline horizon", self.min_deadline_horizon_secs, 0)?;
        window("price staleness", self.default_price_staleness_secs, 1)?;
        if self.default_slippage_bps > self.max_slippage_bps {
            return Err(XIntentError::InvalidParameter(format!(
                "default slippage {} bps exceeds maximum {} bps",
                self.default_slippage_bps, self.max_slippage_bps
            )));
        }
        Ok(())
    }
}

/// `secs` as a duration, if within `min..=MAX_WINDOW_SECS`.
pub fn window(what: &str, secs: i64, min: i64) -> Result<Duration> {
    if !(min..=MAX_WINDOW_SECS).contains(&secs) {
        return Err(XIntentError::InvalidParameter(format!(
            "{} of {}s is outside {}..={}",
            what, secs, min, MAX_WINDOW_SECS
        )));
    }
    Duration::try_seconds(secs)
        .ok_or_else(|| XIntentError::InvalidParameter(format!("{} of {}s is out of range", what, secs)))
}
