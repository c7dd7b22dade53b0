//! Deterministic identifiers shared across chains.
//!
//! Every chain derives these independently, so the encodings are fixed:
//! fields are laid out as 32-byte Ethereum ABI words (big-endian integers,
//! left-padded addresses) and hashed with Keccak-256.

use sha2::Sha256;
use sha3::{Digest, Keccak256};

use crate::types::{Address, ChainId, ContentId, CorrelationId, IntentId, H256};

const WORD: usize = 32;

fn word_u64(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 20..].copy_from_slice(address.as_bytes());
    word
}

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    H256(hasher.finalize().into())
}

/// ABI encoding of `(address, string, uint64)`.
pub fn encode_identity_fields(owner: &Address, name: &str, chain_id: ChainId) -> Vec<u8> {
    let name = name.as_bytes();
    let padded_len = name.len().div_ceil(WORD) * WORD;

    let mut out = Vec::with_capacity(4 * WORD + padded_len);
    out.extend_from_slice(&word_address(owner));
    // Offset of the dynamic string: three head words.
    out.extend_from_slice(&word_u64(3 * WORD as u64));
    out.extend_from_slice(&word_u64(chain_id));
    out.extend_from_slice(&word_u64(name.len() as u64));
    out.extend_from_slice(name);
    out.resize(4 * WORD + padded_len, 0);
    out
}

/// Identity of an agent that every chain derives identically from
/// `(owner, display name, origin chain)`.
pub fn cross_chain_identity(owner: &Address, name: &str, chain_id: ChainId) -> H256 {
    keccak256(encode_identity_fields(owner, name, chain_id))
}

/// Correlation id of the `nonce`-th outbound dispatch of `intent_id` from
/// `src_chain` to `dst_chain`.
pub fn correlation_id(
    src_chain: ChainId,
    intent_id: IntentId,
    dst_chain: ChainId,
    nonce: u64,
) -> CorrelationId {
    let mut data = Vec::with_capacity(4 * WORD);
    data.extend_from_slice(&word_u64(src_chain));
    data.extend_from_slice(&word_u64(intent_id));
    data.extend_from_slice(&word_u64(dst_chain));
    data.extend_from_slice(&word_u64(nonce));
    keccak256(data)
}

/// Content id of a blob in the content-addressed store (SHA-256).
pub fn content_id(bytes: impl AsRef<[u8]>) -> ContentId {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    H256(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> H256 {
        s.parse().unwrap()
    }

    #[test]
    fn test_keccak_known_vectors() {
        assert_eq!(
            keccak256(b""),
            h("0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
        assert_eq!(
            keccak256(b"abc"),
            h("0x4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45")
        );
    }

    #[test]
    fn test_identity_encoding_layout() {
        let owner = Address::repeat_byte(0x11);
        let encoded = encode_identity_fields(&owner, "agent.eth", 1);

        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(&encoded[12..32], owner.as_bytes());
        assert_eq!(encoded[63], 0x60);
        assert_eq!(encoded[95], 1);
        assert_eq!(encoded[127], 9);
        assert_eq!(&encoded[128..137], b"agent.eth");
        assert!(encoded[137..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_cross_chain_identity_is_reproducible() {
        let owner = Address::repeat_byte(0x11);

        assert_eq!(
            cross_chain_identity(&owner, "agent.eth", 1),
            h("0x7d19b9489e833a643d8d0f77427a151686436d7a77f09f3b2efa08d452e4036c")
        );
        assert_eq!(
            cross_chain_identity(&owner, "agent.eth", 2),
            h("0xf6b59a368c0b22bf5e2c96aaea21a02be702e3c6385cb4e54c965e3a4b539424")
        );
    }

    #[test]
    fn test_correlation_id() {
        assert_eq!(
            correlation_id(1, 0, 2, 1),
            h("0x4abaaf52817d62cfb9a8c8412aa68457ac8448261b1fba4848665fb20fce582a")
        );
        assert_ne!(correlation_id(1, 0, 2, 1), correlation_id(1, 0, 2, 2));
    }

    #[test]
    fn test_content_id_is_sha256() {
        assert_eq!(
            content_id(b"abc"),
            h("0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }
}
