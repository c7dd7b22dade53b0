//! Price feed adapter and staleness guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use xintent_core::params::window;
use xintent_core::{Result, Token, XIntentError};

/// Latest answer of a price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReading {
    /// Price scaled by `10^decimals`.
    pub price: u128,
    pub decimals: u8,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest_price(&self, token: Token) -> Result<PriceReading>;
}

/// Feed backed by a map that tests and the node's admin API write to.
#[derive(Clone, Default)]
pub struct InMemoryPriceFeed {
    prices: Arc<RwLock<HashMap<Token, PriceReading>>>,
}

impl InMemoryPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, token: Token, reading: PriceReading) {
        self.prices.write().await.insert(token, reading);
    }
}

#[async_trait]
impl PriceFeed for InMemoryPriceFeed {
    async fn latest_price(&self, token: Token) -> Result<PriceReading> {
        self.prices
            .read()
            .await
            .get(&token)
            .copied()
            .ok_or_else(|| XIntentError::PriceUnavailable {
                token,
                reason: "no feed configured".to_string(),
            })
    }
}

/// Per-token staleness thresholds. A reading older than its threshold is
/// unavailable, never a usable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGuard {
    default_threshold_secs: i64,
    thresholds: HashMap<Token, i64>,
}

impl PriceGuard {
    pub fn new(default_threshold_secs: i64) -> Self {
        Self {
            default_threshold_secs,
            thresholds: HashMap::new(),
        }
    }

    /// Override the threshold for `token`; must lie in `1..=MAX_WINDOW_SECS`.
    pub fn set_threshold(&mut self, token: Token, secs: i64) -> Result<()> {
        window("staleness threshold", secs, 1)?;
        self.thresholds.insert(token, secs);
        Ok(())
    }

    pub fn threshold(&self, token: Token) -> i64 {
        self.thresholds
            .get(&token)
            .copied()
            .unwrap_or(self.default_threshold_secs)
    }

    /// Accept `reading` only if it is non-zero and recent enough.
    pub fn check(&self, token: Token, reading: PriceReading, now: DateTime<Utc>) -> Result<PriceReading> {
        if reading.price == 0 {
            return Err(XIntentError::PriceUnavailable {
                token,
                reason: "zero price".to_string(),
            });
        }
        let max_age = window("staleness threshold", self.threshold(token), 1)?;
        let age = now - reading.updated_at;
        if age > max_age {
            return Err(XIntentError::PriceUnavailable {
                token,
                reason: format!("price is {}s old", age.num_seconds()),
            });
        }
        Ok(reading)
    }

    pub async fn fresh_price(
        &self,
        feed: &dyn PriceFeed,
        token: Token,
        now: DateTime<Utc>,
    ) -> Result<PriceReading> {
        let reading = feed.latest_price(token).await?;
        self.check(token, reading, now)
    }
}
