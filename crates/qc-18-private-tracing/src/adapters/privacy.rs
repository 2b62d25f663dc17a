//! # Privacy Adapters
//!
//! In-memory private transaction store, group metadata store and privacy
//! group registry for testing. Production implementations would go through
//! the privacy controller (decryption) and the private metadata database.

use crate::domain::entities::{
    ExecutedPrivateTransaction, PrivacyGroupHeadBlockMap, PrivateBlockMetadata,
};
use crate::domain::value_objects::{Hash, PrivacyGroupId, PrivacyUserId};
use crate::errors::StoreError;
use crate::ports::outbound::{GroupMetadataStore, PrivacyGroupMembership, PrivateTransactionStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

// =============================================================================
// PRIVATE TRANSACTIONS
// =============================================================================

#[derive(Debug, Clone)]
struct StoredTransaction {
    executed: ExecutedPrivateTransaction,
    recipients: Vec<PrivacyUserId>,
}

/// Private transactions plus the identities able to decrypt each of them.
#[derive(Debug, Default)]
pub struct InMemoryPrivateTransactionStore {
    transactions: RwLock<HashMap<Hash, StoredTransaction>>,
}

impl InMemoryPrivateTransactionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a transaction decryptable by `recipients`.
    pub fn insert(&self, executed: ExecutedPrivateTransaction, recipients: Vec<PrivacyUserId>) {
        self.transactions.write().insert(
            executed.pmt_hash,
            StoredTransaction {
                executed,
                recipients,
            },
        );
    }

    /// Stored transaction regardless of visibility.
    #[must_use]
    pub fn get(&self, pmt_hash: &Hash) -> Option<ExecutedPrivateTransaction> {
        self.transactions
            .read()
            .get(pmt_hash)
            .map(|stored| stored.executed.clone())
    }
}

#[async_trait]
impl PrivateTransactionStore for InMemoryPrivateTransactionStore {
    async fn find_by_pmt_hash(
        &self,
        pmt_hash: &Hash,
        caller: &PrivacyUserId,
    ) -> Result<Option<ExecutedPrivateTransaction>, StoreError> {
        Ok(self
            .transactions
            .read()
            .get(pmt_hash)
            .filter(|stored| stored.recipients.contains(caller))
            .map(|stored| stored.executed.clone()))
    }
}

// =============================================================================
// GROUP METADATA
// =============================================================================

/// Private block metadata keyed by (group, block hash), plus the group head
/// index keyed by block hash.
#[derive(Debug, Default)]
pub struct InMemoryGroupMetadataStore {
    metadata: RwLock<HashMap<(PrivacyGroupId, Hash), PrivateBlockMetadata>>,
    head_maps: RwLock<HashMap<Hash, PrivacyGroupHeadBlockMap>>,
}

impl InMemoryGroupMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores metadata for a group in a block, replacing any previous entry.
    pub fn put(
        &self,
        privacy_group_id: PrivacyGroupId,
        block_hash: Hash,
        metadata: PrivateBlockMetadata,
    ) {
        self.metadata
            .write()
            .insert((privacy_group_id, block_hash), metadata);
    }

    /// Metadata for a group in a block.
    #[must_use]
    pub fn get(
        &self,
        privacy_group_id: &PrivacyGroupId,
        block_hash: &Hash,
    ) -> Option<PrivateBlockMetadata> {
        self.metadata
            .read()
            .get(&(privacy_group_id.clone(), *block_hash))
            .cloned()
    }

    /// Removes metadata for a group in a block.
    pub fn remove(&self, privacy_group_id: &PrivacyGroupId, block_hash: &Hash) {
        self.metadata
            .write()
            .remove(&(privacy_group_id.clone(), *block_hash));
    }

    /// Stores the group head index as of `block_hash`.
    pub fn put_head_map(&self, block_hash: Hash, heads: PrivacyGroupHeadBlockMap) {
        self.head_maps.write().insert(block_hash, heads);
    }

    /// Group head index as of `block_hash`.
    #[must_use]
    pub fn head_map(&self, block_hash: &Hash) -> Option<PrivacyGroupHeadBlockMap> {
        self.head_maps.read().get(block_hash).cloned()
    }
}

#[async_trait]
impl GroupMetadataStore for InMemoryGroupMetadataStore {
    async fn private_block_metadata(
        &self,
        privacy_group_id: &PrivacyGroupId,
        block_hash: &Hash,
    ) -> Result<Option<PrivateBlockMetadata>, StoreError> {
        Ok(self.get(privacy_group_id, block_hash))
    }

    async fn privacy_group_head_map(
        &self,
        block_hash: &Hash,
    ) -> Result<Option<PrivacyGroupHeadBlockMap>, StoreError> {
        Ok(self.head_map(block_hash))
    }
}

// =============================================================================
// PRIVACY GROUPS
// =============================================================================

/// Privacy group registry.
#[derive(Debug, Default)]
pub struct InMemoryPrivacyGroups {
    groups: RwLock<HashMap<PrivacyGroupId, Vec<PrivacyUserId>>>,
}

impl InMemoryPrivacyGroups {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a group.
    pub fn create_group(&self, privacy_group_id: PrivacyGroupId, members: Vec<PrivacyUserId>) {
        self.groups.write().insert(privacy_group_id, members);
    }

    /// Removes a member from a group. Past transactions stay decryptable;
    /// only current membership changes.
    pub fn remove_member(&self, privacy_group_id: &PrivacyGroupId, member: &PrivacyUserId) {
        if let Some(members) = self.groups.write().get_mut(privacy_group_id) {
            members.retain(|m| m != member);
        }
    }
}

#[async_trait]
impl PrivacyGroupMembership for InMemoryPrivacyGroups {
    async fn members(
        &self,
        privacy_group_id: &PrivacyGroupId,
    ) -> Result<Option<Vec<PrivacyUserId>>, StoreError> {
        Ok(self.groups.read().get(privacy_group_id).cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
