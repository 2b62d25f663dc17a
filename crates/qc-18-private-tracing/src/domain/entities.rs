//! # Core Domain Entities
//!
//! Records consumed read-only by the trace pipeline: decrypted private
//! transactions, canonical blocks, and per-group private block metadata.

use crate::domain::value_objects::{Address, Bytes, Hash, PrivacyGroupId, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PRIVATE TRANSACTION
// =============================================================================

/// Decrypted confidential transaction content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTransaction {
    /// Sender address.
    pub sender: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Value transferred.
    pub value: U256,
    /// Calldata or init code.
    pub payload: Bytes,
    /// Sender nonce within the privacy group.
    pub nonce: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Privacy group the transaction executes in.
    pub privacy_group_id: PrivacyGroupId,
}

impl PrivateTransaction {
    /// Returns true if this is a contract creation transaction.
    #[must_use]
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// A private transaction together with where it executed.
///
/// Returned by the private transaction store when the caller is allowed to
/// decrypt the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedPrivateTransaction {
    /// Decrypted content.
    pub transaction: PrivateTransaction,
    /// Hash of the public proxy (marker) transaction.
    pub pmt_hash: Hash,
    /// Number of the block the proxy transaction was included in.
    pub block_number: u64,
    /// Hash of that block at the time of execution.
    pub block_hash: Hash,
}

impl ExecutedPrivateTransaction {
    /// Privacy group of the underlying transaction.
    #[must_use]
    pub fn privacy_group_id(&self) -> &PrivacyGroupId {
        &self.transaction.privacy_group_id
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// Public block header fields the replay needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block hash.
    pub hash: Hash,
    /// Parent block hash.
    pub parent_hash: Hash,
    /// Block number.
    pub number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
    /// Block proposer.
    pub coinbase: Address,
    /// Block gas limit.
    pub gas_limit: u64,
}

impl BlockHeader {
    /// Returns true for the genesis block.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }
}

/// A canonical block: its header and the ordered proxy transaction hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Proxy transaction hashes in block order.
    pub transactions: Vec<Hash>,
}

impl Block {
    /// Block hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    /// Block number.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Position of a proxy transaction within the block.
    #[must_use]
    pub fn transaction_position(&self, pmt_hash: &Hash) -> Option<usize> {
        self.transactions.iter().position(|h| h == pmt_hash)
    }
}

// =============================================================================
// PRIVATE BLOCK METADATA
// =============================================================================

/// One private transaction executed for a group in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTransactionMetadata {
    /// Proxy transaction hash.
    pub pmt_hash: Hash,
    /// Private state root recorded after this transaction executed.
    pub state_root: Hash,
}

/// Ordered private transactions a group executed in one block.
///
/// ## Invariant
/// Order matches the original execution order. Replay follows it exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateBlockMetadata {
    /// Entries in execution order.
    pub transactions: Vec<PrivateTransactionMetadata>,
}

impl PrivateBlockMetadata {
    /// Creates metadata from entries in execution order.
    #[must_use]
    pub fn new(transactions: Vec<PrivateTransactionMetadata>) -> Self {
        Self { transactions }
    }

    /// State root after the last private transaction of the block.
    #[must_use]
    pub fn latest_state_root(&self) -> Option<Hash> {
        self.transactions.last().map(|tx| tx.state_root)
    }
}

// =============================================================================
// PRIVACY GROUP HEAD BLOCK MAP
// =============================================================================

/// Per-block index from each privacy group to the last block, at or before
/// the indexed one, in which the group executed a private transaction.
///
/// A group absent from the map has never executed anything on this branch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyGroupHeadBlockMap {
    heads: BTreeMap<PrivacyGroupId, Hash>,
}

impl PrivacyGroupHeadBlockMap {
    /// Head block of `privacy_group_id`.
    #[must_use]
    pub fn get(&self, privacy_group_id: &PrivacyGroupId) -> Option<Hash> {
        self.heads.get(privacy_group_id).copied()
    }

    /// Map of a child block: the parent's heads with every group active in
    /// `block_hash` moved to it.
    #[must_use]
    pub fn advance<'a>(
        &self,
        block_hash: Hash,
        active_groups: impl IntoIterator<Item = &'a PrivacyGroupId>,
    ) -> Self {
        let mut heads = self.heads.clone();
        for group in active_groups {
            heads.insert(group.clone(), block_hash);
        }
        Self { heads }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_state_root() {
        assert_eq!(PrivateBlockMetadata::default().latest_state_root(), None);

        let metadata = PrivateBlockMetadata::new(vec![
            PrivateTransactionMetadata {
                pmt_hash: Hash::new([1; 32]),
                state_root: Hash::new([0xA; 32]),
            },
            PrivateTransactionMetadata {
                pmt_hash: Hash::new([2; 32]),
                state_root: Hash::new([0xB; 32]),
            },
        ]);
        assert_eq!(metadata.latest_state_root(), Some(Hash::new([0xB; 32])));
    }

    #[test]
    fn test_transaction_position() {
        let block = Block {
            header: BlockHeader {
                hash: Hash::new([9; 32]),
                parent_hash: Hash::ZERO,
                number: 1,
                timestamp: 0,
                coinbase: Address::ZERO,
                gas_limit: 30_000_000,
            },
            transactions: vec![Hash::new([1; 32]), Hash::new([2; 32])],
        };
        assert_eq!(block.transaction_position(&Hash::new([2; 32])), Some(1));
        assert_eq!(block.transaction_position(&Hash::new([3; 32])), None);
    }

    #[test]
    fn test_head_map_advances_only_active_groups() {
        let a = PrivacyGroupId::new("a");
        let b = PrivacyGroupId::new("b");
        let first = PrivacyGroupHeadBlockMap::default().advance(Hash::new([1; 32]), [&a, &b]);
        let second = first.advance(Hash::new([2; 32]), [&a]);

        assert_eq!(second.get(&a), Some(Hash::new([2; 32])));
        assert_eq!(second.get(&b), Some(Hash::new([1; 32])));
        assert_eq!(second.get(&PrivacyGroupId::new("c")), None);
        // Parent map is untouched.
        assert_eq!(first.get(&a), Some(Hash::new([1; 32])));
    }
}
