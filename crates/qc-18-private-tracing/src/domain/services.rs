//! # Domain Services
//!
//! Pure, deterministic helpers shared by replay and the reference adapters.

use crate::domain::value_objects::{Address, Hash};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

/// Computes Keccak-256 of the input.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash::new(out)
}

/// Root of an empty private state: `keccak256(rlp(""))`.
#[must_use]
pub fn empty_state_root() -> Hash {
    keccak256(&rlp::NULL_RLP)
}

/// Computes the CREATE address: `keccak256(rlp([sender, nonce]))[12..]`.
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.as_bytes().to_vec());
    stream.append(&nonce);
    let hash = keccak256(&stream.out());

    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash.as_bytes()[12..]);
    Address::new(addr)
}

/// Intrinsic gas of a private transaction: base cost plus calldata cost.
#[must_use]
pub fn intrinsic_gas(payload: &[u8], is_contract_creation: bool) -> u64 {
    let base = if is_contract_creation { 53_000 } else { 21_000 };
    let data_gas: u64 = payload
        .iter()
        .map(|&byte| if byte == 0 { 4u64 } else { 16u64 })
        .sum();
    base + data_gas
}

// =============================================================================
// TESTS
// =============================================================================
