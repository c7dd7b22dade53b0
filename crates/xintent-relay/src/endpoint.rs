//! Endpoint-id addressed transport.
//!
//! Every remote endpoint id must have a peer (the authorized counterpart
//! contract on that chain) before anything is sent to or accepted from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xintent_core::{
    Address, ChainId, Envelope, Result, Route, TransportKind, TransportMeta, XIntentError,
};

use crate::transport::{Fee, FeeSchedule, Resolved, SendOptions, Transport};

/// Authorized counterpart on a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub chain_id: ChainId,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct EndpointTransport {
    local_eid: u32,
    peers: HashMap<u32, Peer>,
    fees: FeeSchedule,
}

impl EndpointTransport {
    pub fn new(local_eid: u32, fees: FeeSchedule) -> Self {
        Self {
            local_eid,
            peers: HashMap::new(),
            fees,
        }
    }

    pub fn local_eid(&self) -> u32 {
        self.local_eid
    }

    pub fn set_peer(&mut self, eid: u32, peer: Peer) {
        self.peers.insert(eid, peer);
    }

    pub fn peer(&self, eid: u32) -> Option<&Peer> {
        self.peers.get(&eid)
    }

    fn require_peer(&self, eid: u32) -> Result<&Peer> {
        self.peers.get(&eid).ok_or_else(|| XIntentError::PeerNotSet {
            transport: TransportKind::GenericEndpoint.to_string(),
            destination: format!("eid {}", eid),
        })
    }
}

impl Transport for EndpointTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::GenericEndpoint
    }

    fn resolve(&self, route: &Route) -> Result<Resolved> {
        let Route::GenericEndpoint { dst_eid } = *route else {
            return Err(XIntentError::InvalidParameter(format!(
                "{} route sent to generic endpoint transport",
                route.kind()
            )));
        };
        let peer = self.require_peer(dst_eid)?;
        Ok(Resolved {
            destination_chain: peer.chain_id,
            meta: TransportMeta::GenericEndpoint {
                src_eid: self.local_eid,
                dst_eid,
            },
        })
    }

    fn quote(&self, route: &Route, payload_len: usize, options: &SendOptions) -> Result<Fee> {
        self.resolve(route)?;
        Ok(Fee {
            transport: self.kind(),
            native_fee: self.fees.fee_for(payload_len, options)?,
        })
    }

    fn verify_inbound(&self, envelope: &Envelope) -> Result<()> {
        let TransportMeta::GenericEndpoint { src_eid, dst_eid } = envelope.meta else {
            return Err(XIntentError::InvalidParameter(
                "envelope is not a generic endpoint message".to_string(),
            ));
        };
        if dst_eid != self.local_eid {
            return Err(XIntentError::WrongEndpoint {
                dst_eid,
                local_eid: self.local_eid,
            });
        }
        let peer = self.require_peer(src_eid)?;
        if peer.address != envelope.sender || peer.chain_id != envelope.source_chain {
            return Err(XIntentError::PeerMismatch {
                expected: peer.address,
                sender: envelope.sender,
            });
        }
        Ok(())
    }
}
