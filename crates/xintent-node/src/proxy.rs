//! Destination-side execution proxy.
//!
//! Executes requests arriving from other chains against a fresh price and
//! records the resulting swap. It never executes on a stale or missing
//! price.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xintent_core::{
    Address, AgentId, Amount, ChainId, CorrelationId, IntentId, Result, Token, XIntentError,
    BPS_DENOMINATOR,
};
use xintent_state::{PriceGuard, PriceReading};

/// A swap executed on behalf of a remote intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: u64,
    pub intent_id: IntentId,
    pub source_chain: ChainId,
    pub correlation_id: CorrelationId,
    pub agent_id: AgentId,
    pub token: Token,
    pub amount: Amount,
    pub price: u128,
    pub price_decimals: u8,
    /// Minimum output accepted after slippage, in price units.
    pub min_out: Amount,
    pub slippage_bps: u16,
    pub executed_at: DateTime<Utc>,
}

/// Request decoded from an inbound Execute message.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest {
    pub intent_id: IntentId,
    pub source_chain: ChainId,
    pub correlation_id: CorrelationId,
    pub agent_id: AgentId,
    pub token: Token,
    pub amount: Amount,
}

pub struct ExecutionProxy {
    admin: Address,
    guard: PriceGuard,
    slippage_bps: u16,
    max_slippage_bps: u16,
    next_swap_id: u64,
    swaps: BTreeMap<u64, SwapRecord>,
}

impl ExecutionProxy {
    pub fn new(admin: Address, guard: PriceGuard, slippage_bps: u16, max_slippage_bps: u16) -> Self {
        Self {
            admin,
            guard,
            slippage_bps,
            max_slippage_bps,
            next_swap_id: 0,
            swaps: BTreeMap::new(),
        }
    }

    fn ensure_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(XIntentError::unauthorized(caller, "proxy owner"));
        }
        Ok(())
    }

    pub fn set_default_slippage_tolerance(&mut self, caller: Address, bps: u16) -> Result<()> {
        self.ensure_admin(caller)?;
        if bps > self.max_slippage_bps {
            return Err(XIntentError::InvalidParameter(format!(
                "tolerance too high: {} bps exceeds {} bps",
                bps, self.max_slippage_bps
            )));
        }
        self.slippage_bps = bps;
        Ok(())
    }

    pub fn default_slippage_tolerance(&self) -> u16 {
        self.slippage_bps
    }

    pub fn set_price_staleness_threshold(&mut self, caller: Address, token: Token, secs: i64) -> Result<()> {
        self.ensure_admin(caller)?;
        self.guard.set_threshold(token, secs)
    }

    pub fn price_staleness_threshold(&self, token: Token) -> i64 {
        self.guard.threshold(token)
    }

    /// Reading as the proxy would accept it for `token` at `now`.
    pub fn check_price(&self, token: Token, reading: PriceReading, now: DateTime<Utc>) -> Result<PriceReading> {
        self.guard.check(token, reading, now)
    }

    pub fn get_swap(&self, id: u64) -> Option<&SwapRecord> {
        self.swaps.get(&id)
    }

    pub fn swaps(&self) -> impl Iterator<Item = &SwapRecord> {
        self.swaps.values()
    }

    /// Validate the price and compute the swap, without recording it.
    pub fn prepare(
        &self,
        request: &ExecutionRequest,
        price: Result<PriceReading>,
        now: DateTime<Utc>,
    ) -> Result<SwapRecord> {
        let reading = self.guard.check(request.token, price?, now)?;
        let min_out = min_out(request.amount, &reading, self.slippage_bps)?;
        Ok(SwapRecord {
            id: self.next_swap_id,
            intent_id: request.intent_id,
            source_chain: request.source_chain,
            correlation_id: request.correlation_id,
            agent_id: request.agent_id,
            token: request.token,
            amount: request.amount,
            price: reading.price,
            price_decimals: reading.decimals,
            min_out,
            slippage_bps: self.slippage_bps,
            executed_at: now,
        })
    }

    /// Record a swap produced by [`ExecutionProxy::prepare`].
    pub fn commit(&mut self, swap: SwapRecord) -> u64 {
        let id = self.next_swap_id;
        self.next_swap_id += 1;
        self.swaps.insert(id, SwapRecord { id, ..swap });
        id
    }
}

/// `amount × price / 10^decimals`, less the slippage tolerance.
fn min_out(amount: Amount, reading: &PriceReading, slippage_bps: u16) -> Result<Amount> {
    let overflow = || XIntentError::InvalidParameter("swap amount overflow".to_string());
    let scale = 10u128
        .checked_pow(u32::from(reading.decimals))
        .ok_or_else(overflow)?;
    let value = amount
        .checked_mul(reading.price)
        .ok_or_else(overflow)?
        / scale;
    let kept = BPS_DENOMINATOR - u128::from(slippage_bps);
    Ok(value.checked_mul(kept).ok_or_else(overflow)? / BPS_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use xintent_core::{H256, UNIT};

    const ADMIN: Address = Address::repeat_byte(0xad);
    const TOKEN: Address = Address::repeat_byte(0x70);

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn proxy() -> ExecutionProxy {
        ExecutionProxy::new(ADMIN, PriceGuard::new(3_600), 50, 1_000)
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            intent_id: 0,
            source_chain: 1,
            correlation_id: H256::repeat_byte(1),
            agent_id: 1,
            token: TOKEN,
            amount: UNIT,
        }
    }

    fn price(age_secs: i64) -> PriceReading {
        PriceReading {
            price: 2_000 * 100_000_000,
            decimals: 8,
            updated_at: now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_slippage_tolerance_bounds() {
        let mut proxy = proxy();
        proxy.set_default_slippage_tolerance(ADMIN, 200).unwrap();
        assert_eq!(proxy.default_slippage_tolerance(), 200);

        let err = proxy.set_default_slippage_tolerance(ADMIN, 2_000).unwrap_err();
        assert!(err.to_string().contains("tolerance too high"));
        assert_eq!(proxy.default_slippage_tolerance(), 200);

        assert!(proxy.set_default_slippage_tolerance(TOKEN, 100).is_err());
    }

    #[test]
    fn test_staleness_threshold_per_token() {
        let mut proxy = proxy();
        proxy.set_price_staleness_threshold(ADMIN, TOKEN, 60).unwrap();
        assert_eq!(proxy.price_staleness_threshold(TOKEN), 60);
        assert_eq!(proxy.price_staleness_threshold(Address::ZERO), 3_600);
    }

    #[test]
    fn test_execute_with_fresh_price() {
        let mut proxy = proxy();
        let swap = proxy.prepare(&request(), Ok(price(10)), now()).unwrap();

        // 1 unit at 2000, less 0.5%.
        assert_eq!(swap.min_out, 2_000 * UNIT * 9_950 / 10_000);
        let id = proxy.commit(swap);
        assert_eq!(id, 0);
        assert_eq!(proxy.get_swap(0).unwrap().intent_id, 0);
        assert!(proxy.get_swap(1).is_none());
    }

    #[test]
    fn test_stale_price_refuses_execution() {
        let proxy = proxy();
        let err = proxy.prepare(&request(), Ok(price(7_200)), now()).unwrap_err();
        assert!(matches!(err, XIntentError::PriceUnavailable { .. }));

        let missing = Err(XIntentError::PriceUnavailable {
            token: TOKEN,
            reason: "no feed configured".to_string(),
        });
        assert!(proxy.prepare(&request(), missing, now()).is_err());
        assert_eq!(proxy.swaps().count(), 0);
    }
}
