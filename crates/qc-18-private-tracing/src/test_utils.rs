//! # Test Utilities
//!
//! An in-memory privacy network: a public chain of proxy transactions with
//! per-group private state, built by processing blocks the way a node does
//! (committing state and recording metadata), so the trace service has
//! real history to replay.

use crate::adapters::{
    BasicMessageProcessor, InMemoryChain, InMemoryGroupMetadataStore, InMemoryPrivacyGroups,
    InMemoryPrivateStateStorage, InMemoryPrivateTransactionStore,
};
use crate::config::{AuthorizationMode, ConfigError, TraceConfig};
use crate::domain::call_tree::TransactionStatus;
use crate::domain::entities::{
    Block, BlockHeader, ExecutedPrivateTransaction, PrivacyGroupHeadBlockMap,
    PrivateBlockMetadata, PrivateTransaction, PrivateTransactionMetadata,
};
use crate::domain::services::{compute_contract_address, keccak256};
use crate::domain::state::WorldState;
use crate::domain::value_objects::{Address, Bytes, Hash, PrivacyGroupId, PrivacyUserId, U256};
use crate::errors::ReplayError;
use crate::ports::outbound::{
    NoopTracer, PrivacyGroupMembership, PrivateStateStorage, PrivateTransactionProcessor,
};
use crate::service::{TracePorts, TraceQueryService};
use crate::state_root::PrivateStateRootResolver;
use rlp::RlpStream;
use std::sync::Arc;

/// Default private transaction sender.
pub const SENDER: Address = Address([
    0x6a, 0xc7, 0xea, 0x33, 0xf8, 0x83, 0x1e, 0xa9, 0xdc, 0xc5, 0x33, 0x93, 0xaa, 0xa8, 0x8b,
    0x25, 0xa7, 0x85, 0xdb, 0xf0,
]);

/// Selector of `set(uint256)`.
pub const SET_SELECTOR: [u8; 4] = [0x60, 0xfe, 0x47, 0xb1];

/// Init code deployed by [`PrivacyNetwork::deploy`].
pub const STORAGE_CONTRACT_CODE: &[u8] = &[
    0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15, 0x61, 0x00, 0x10, 0x57, 0x60, 0x00, 0x80,
    0xfd, 0x5b, 0x50,
];

const GAS_LIMIT: u64 = 3_000_000;

/// Calldata for `set(value)`.
#[must_use]
pub fn call_payload(value: u64) -> Vec<u8> {
    let mut word = [0u8; 32];
    U256::from(value).to_big_endian(&mut word);
    let mut payload = SET_SELECTOR.to_vec();
    payload.extend_from_slice(&word);
    payload
}

/// A block produced by [`PrivacyNetwork::mine_block`].
#[derive(Debug, Clone)]
pub struct MinedBlock {
    /// The canonical block.
    pub block: Block,
    /// Proxy transaction hash per submitted transaction, in order.
    pub pmt_hashes: Vec<Hash>,
    /// Historical outcome per submitted transaction, in order.
    pub statuses: Vec<TransactionStatus>,
}

/// In-memory privacy network fixture.
pub struct PrivacyNetwork {
    /// Public chain.
    pub chain: Arc<InMemoryChain>,
    /// Private transactions with their recipients.
    pub transactions: Arc<InMemoryPrivateTransactionStore>,
    /// Per-group block metadata.
    pub metadata: Arc<InMemoryGroupMetadataStore>,
    /// Privacy groups.
    pub groups: Arc<InMemoryPrivacyGroups>,
    /// Committed private states.
    pub storage: Arc<InMemoryPrivateStateStorage>,
    processor: BasicMessageProcessor,
    resolver: PrivateStateRootResolver,
}

impl Default for PrivacyNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivacyNetwork {
    /// Network with only a genesis block.
    #[must_use]
    pub fn new() -> Self {
        let chain = Arc::new(InMemoryChain::new());
        let metadata = Arc::new(InMemoryGroupMetadataStore::new());
        let genesis = header(Hash::ZERO, 0, 0);
        metadata.put_head_map(genesis.hash, PrivacyGroupHeadBlockMap::default());
        chain.append_canonical(Block {
            header: genesis,
            transactions: Vec::new(),
        });

        Self {
            resolver: PrivateStateRootResolver::new(chain.clone(), metadata.clone()),
            chain,
            transactions: Arc::new(InMemoryPrivateTransactionStore::new()),
            metadata,
            groups: Arc::new(InMemoryPrivacyGroups::new()),
            storage: Arc::new(InMemoryPrivateStateStorage::new()),
            processor: BasicMessageProcessor::new(),
        }
    }

    /// Creates a privacy group.
    pub fn create_group(&self, name: &str, members: &[PrivacyUserId]) -> PrivacyGroupId {
        let id = PrivacyGroupId::new(name);
        self.groups.create_group(id.clone(), members.to_vec());
        id
    }

    /// Contract creation from [`SENDER`].
    #[must_use]
    pub fn creation(&self, group: &PrivacyGroupId, nonce: u64, code: &[u8]) -> PrivateTransaction {
        PrivateTransaction {
            sender: SENDER,
            to: None,
            value: U256::zero(),
            payload: Bytes::from_slice(code),
            nonce,
            gas_limit: GAS_LIMIT,
            privacy_group_id: group.clone(),
        }
    }

    /// Message call from [`SENDER`].
    #[must_use]
    pub fn call(
        &self,
        group: &PrivacyGroupId,
        nonce: u64,
        to: Address,
        payload: &[u8],
    ) -> PrivateTransaction {
        PrivateTransaction {
            to: Some(to),
            payload: Bytes::from_slice(payload),
            ..self.creation(group, nonce, &[])
        }
    }

    /// Mines a block deploying [`STORAGE_CONTRACT_CODE`] and returns the
    /// contract address.
    ///
    /// # Errors
    ///
    /// See [`Self::mine_block`].
    pub async fn deploy(&self, group: &PrivacyGroupId, nonce: u64) -> Result<Address, ReplayError> {
        self.mine_block(vec![self.creation(group, nonce, STORAGE_CONTRACT_CODE)])
            .await?;
        Ok(compute_contract_address(SENDER, nonce))
    }

    /// Appends a canonical block carrying `transactions` and processes them:
    /// each group's state advances from its latest root, the resulting state
    /// is committed, and metadata with per-transaction roots is recorded.
    /// Every transaction is decryptable by its group's current members.
    ///
    /// # Errors
    ///
    /// Propagates processor faults and missing parent state.
    pub async fn mine_block(
        &self,
        transactions: Vec<PrivateTransaction>,
    ) -> Result<MinedBlock, ReplayError> {
        let parent = self
            .chain
            .head()
            .ok_or(ReplayError::MissingAncestor(Hash::ZERO))?;
        let number = parent.number + 1;
        let header = header(parent.hash, number, 0);
        let pmt_hashes: Vec<Hash> = transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| pmt_hash(number, index, tx))
            .collect();

        let mut pending: Vec<(PrivacyGroupId, WorldState, Vec<PrivateTransactionMetadata>)> =
            Vec::new();
        let mut statuses = Vec::with_capacity(transactions.len());

        for (tx, pmt_hash) in transactions.into_iter().zip(&pmt_hashes) {
            let group = tx.privacy_group_id.clone();
            let slot = match pending.iter().position(|(id, _, _)| id == &group) {
                Some(slot) => slot,
                None => {
                    let state = self.latest_state(&group, &header).await?;
                    pending.push((group.clone(), state, Vec::new()));
                    pending.len() - 1
                }
            };

            let (_, state, entries) = &mut pending[slot];
            let status = self
                .processor
                .process(state, &header, &tx, &mut NoopTracer)
                .map_err(|source| ReplayError::Execution {
                    pmt_hash: *pmt_hash,
                    source,
                })?;
            entries.push(PrivateTransactionMetadata {
                pmt_hash: *pmt_hash,
                state_root: state.root(),
            });
            statuses.push(status);

            let recipients = self.groups.members(&group).await?.unwrap_or_default();
            self.transactions.insert(
                ExecutedPrivateTransaction {
                    transaction: tx,
                    pmt_hash: *pmt_hash,
                    block_number: number,
                    block_hash: header.hash,
                },
                recipients,
            );
        }

        let heads = self
            .metadata
            .head_map(&parent.hash)
            .unwrap_or_default()
            .advance(header.hash, pending.iter().map(|(group, _, _)| group));
        self.metadata.put_head_map(header.hash, heads);

        for (group, state, entries) in pending {
            self.storage.commit(state);
            self.metadata
                .put(group, header.hash, PrivateBlockMetadata::new(entries));
        }

        let block = Block {
            header,
            transactions: pmt_hashes.clone(),
        };
        self.chain.append_canonical(block.clone());

        Ok(MinedBlock {
            block,
            pmt_hashes,
            statuses,
        })
    }

    async fn latest_state(
        &self,
        group: &PrivacyGroupId,
        header: &BlockHeader,
    ) -> Result<WorldState, ReplayError> {
        let root = self.resolver.resolve_parent_state_root(group, header).await?;
        let state = self
            .storage
            .checkout(&root)
            .await?
            .ok_or(ReplayError::StateUnavailable(root))?;
        self.storage.release(&root);
        Ok(state)
    }

    /// Replaces the canonical block at `number` with an empty sibling, as a
    /// reorg would. Returns the new canonical hash.
    pub fn orphan_block(&self, number: u64) -> Option<Hash> {
        let orphaned = self.chain.canonical_header(number)?;
        let replacement = header(orphaned.parent_hash, number, 1);
        let hash = replacement.hash;
        if let Some(heads) = self.metadata.head_map(&orphaned.parent_hash) {
            self.metadata.put_head_map(hash, heads);
        }
        self.chain.insert_fork_block(Block {
            header: replacement,
            transactions: Vec::new(),
        });
        self.chain.set_canonical(number, hash);
        Some(hash)
    }

    /// Block a proxy transaction was mined in.
    #[must_use]
    pub fn block_of(&self, pmt_hash: &Hash) -> Option<Hash> {
        self.transactions.get(pmt_hash).map(|tx| tx.block_hash)
    }

    /// Overwrites every recorded state root of `group` in `block_hash`.
    pub fn corrupt_recorded_root(&self, group: &PrivacyGroupId, block_hash: &Hash) {
        if let Some(mut metadata) = self.metadata.get(group, block_hash) {
            for entry in &mut metadata.transactions {
                entry.state_root = keccak256(b"corrupted");
            }
            self.metadata.put(group.clone(), *block_hash, metadata);
        }
    }

    /// Ports over this network's stores.
    #[must_use]
    pub fn ports(&self) -> TracePorts {
        TracePorts {
            chain: self.chain.clone(),
            transactions: self.transactions.clone(),
            metadata: self.metadata.clone(),
            storage: self.storage.clone(),
            processor: Arc::new(self.processor),
            membership: self.groups.clone(),
        }
    }

    /// Trace service over this network.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` does not validate.
    pub fn service(&self, config: TraceConfig) -> Result<TraceQueryService, ConfigError> {
        TraceQueryService::new(self.ports(), config)
    }

    /// Single-tenant trace service acting as `node`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the default configuration does not validate.
    pub fn single_tenant_service(
        &self,
        node: PrivacyUserId,
    ) -> Result<TraceQueryService, ConfigError> {
        self.service(TraceConfig {
            node_privacy_user_id: Some(node),
            ..TraceConfig::default()
        })
    }

    /// Multi-tenant trace service.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the default configuration does not validate.
    pub fn multi_tenant_service(&self) -> Result<TraceQueryService, ConfigError> {
        self.service(TraceConfig {
            authorization: AuthorizationMode::MultiTenant,
            ..TraceConfig::default()
        })
    }
}

fn header(parent_hash: Hash, number: u64, fork: u8) -> BlockHeader {
    let mut stream = RlpStream::new_list(3);
    stream.append(&parent_hash.as_bytes().to_vec());
    stream.append(&number);
    stream.append(&fork);
    BlockHeader {
        hash: keccak256(&stream.out()),
        parent_hash,
        number,
        timestamp: 1_700_000_000 + number * 2,
        coinbase: Address::ZERO,
        gas_limit: 30_000_000,
    }
}

fn pmt_hash(number: u64, index: usize, tx: &PrivateTransaction) -> Hash {
    let mut stream = RlpStream::new_list(5);
    stream.append(&number);
    stream.append(&(index as u64));
    stream.append(&tx.sender.as_bytes().to_vec());
    stream.append(&tx.nonce);
    stream.append(&tx.privacy_group_id.as_str().as_bytes().to_vec());
    keccak256(&stream.out())
}
