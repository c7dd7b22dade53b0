//! Chain-selector addressed transport with an allowlist of destinations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xintent_core::{
    Address, ChainId, Envelope, Result, Route, TransportKind, TransportMeta, XIntentError,
};

use crate::transport::{Fee, FeeSchedule, Resolved, SendOptions, Transport};

/// An allowlisted selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedChain {
    pub chain_id: ChainId,
    /// When set, inbound messages from this selector must come from it.
    pub sender: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct SelectorTransport {
    local_selector: u64,
    allowed: HashMap<u64, AllowedChain>,
    fees: FeeSchedule,
}

impl SelectorTransport {
    pub fn new(local_selector: u64, fees: FeeSchedule) -> Self {
        Self {
            local_selector,
            allowed: HashMap::new(),
            fees,
        }
    }

    pub fn local_selector(&self) -> u64 {
        self.local_selector
    }

    pub fn add_chain_selector(&mut self, selector: u64, allowed: AllowedChain) {
        self.allowed.insert(selector, allowed);
    }

    pub fn remove_chain_selector(&mut self, selector: u64) -> bool {
        self.allowed.remove(&selector).is_some()
    }

    pub fn is_supported(&self, selector: u64) -> bool {
        self.allowed.contains_key(&selector)
    }

    fn require(&self, selector: u64) -> Result<&AllowedChain> {
        self.allowed
            .get(&selector)
            .ok_or(XIntentError::UnsupportedChainSelector(selector))
    }
}

impl Transport for SelectorTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ChainSelector
    }

    fn resolve(&self, route: &Route) -> Result<Resolved> {
        let Route::ChainSelector { dest_selector } = *route else {
            return Err(XIntentError::InvalidParameter(format!(
                "{} route sent to chain selector transport",
                route.kind()
            )));
        };
        let allowed = self.require(dest_selector)?;
        Ok(Resolved {
            destination_chain: allowed.chain_id,
            meta: TransportMeta::ChainSelector {
                source_selector: self.local_selector,
                dest_selector,
            },
        })
    }

    fn quote(&self, route: &Route, payload_len: usize, _options: &SendOptions) -> Result<Fee> {
        self.resolve(route)?;
        // Gas is not priced by this transport.
        let options = SendOptions { gas_limit: 0 };
        Ok(Fee {
            transport: self.kind(),
            native_fee: self.fees.fee_for(payload_len, &options)?,
        })
    }

    fn verify_inbound(&self, envelope: &Envelope) -> Result<()> {
        let TransportMeta::ChainSelector {
            source_selector,
            dest_selector,
        } = envelope.meta
        else {
            return Err(XIntentError::InvalidParameter(
                "envelope is not a chain selector message".to_string(),
            ));
        };
        if dest_selector != self.local_selector {
            return Err(XIntentError::UnsupportedChainSelector(dest_selector));
        }
        let allowed = self.require(source_selector)?;
        if allowed.chain_id != envelope.source_chain {
            return Err(XIntentError::UnsupportedChainSelector(source_selector));
        }
        match allowed.sender {
            Some(expected) if expected != envelope.sender => Err(XIntentError::PeerMismatch {
                expected,
                sender: envelope.sender,
            }),
            _ => Ok(()),
        }
    }
}
