//! # Chain Adapter
//!
//! In-memory canonical chain index for testing.
//! Production implementation would read the node's blockchain storage.

use crate::domain::entities::{Block, BlockHeader};
use crate::domain::value_objects::Hash;
use crate::errors::StoreError;
use crate::ports::outbound::ChainIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct ChainInner {
    blocks: HashMap<Hash, Block>,
    canonical: HashMap<u64, Hash>,
    unavailable: bool,
}

/// In-memory chain: all known blocks plus the canonical number index.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    inner: RwLock<ChainInner>,
}

impl InMemoryChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a block and makes it canonical at its height.
    pub fn append_canonical(&self, block: Block) {
        let mut inner = self.inner.write();
        inner.canonical.insert(block.number(), block.hash());
        inner.blocks.insert(block.hash(), block);
    }

    /// Stores a block without touching the canonical index.
    pub fn insert_fork_block(&self, block: Block) {
        self.inner.write().blocks.insert(block.hash(), block);
    }

    /// Points the canonical index at `hash` for `number` (reorg).
    pub fn set_canonical(&self, number: u64, hash: Hash) {
        self.inner.write().canonical.insert(number, hash);
    }

    /// Canonical head, if any block was appended.
    #[must_use]
    pub fn head(&self) -> Option<BlockHeader> {
        let inner = self.inner.read();
        let number = inner.canonical.keys().max()?;
        let hash = inner.canonical.get(number)?;
        inner.blocks.get(hash).map(|block| block.header.clone())
    }

    /// Header of the canonical block at `number`.
    #[must_use]
    pub fn canonical_header(&self, number: u64) -> Option<BlockHeader> {
        let inner = self.inner.read();
        let hash = inner.canonical.get(&number)?;
        inner.blocks.get(hash).map(|block| block.header.clone())
    }

    /// Makes every lookup fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().unavailable = unavailable;
    }

    fn check_available(inner: &ChainInner) -> Result<(), StoreError> {
        if inner.unavailable {
            return Err(StoreError::Unavailable("chain index offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainIndex for InMemoryChain {
    async fn block_hash_by_number(&self, number: u64) -> Result<Option<Hash>, StoreError> {
        let inner = self.inner.read();
        Self::check_available(&inner)?;
        Ok(inner.canonical.get(&number).copied())
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError> {
        let inner = self.inner.read();
        Self::check_available(&inner)?;
        Ok(inner.blocks.get(hash).cloned())
    }

    async fn block_header_by_hash(&self, hash: &Hash) -> Result<Option<BlockHeader>, StoreError> {
        let inner = self.inner.read();
        Self::check_available(&inner)?;
        Ok(inner.blocks.get(hash).map(|block| block.header.clone()))
    }
}
