//! # State Replay
//!
//! Re-executes one block's private transactions for one group on an
//! ephemeral snapshot of the group's state, recording a call tree per
//! transaction.
//!
//! ## Invariants
//!
//! - Transactions run strictly in metadata order, each on the state left by
//!   the previous one.
//! - The snapshot is released and never persisted, on every exit path
//!   (success, error, or the future being dropped on timeout).

use crate::domain::call_tree::{TransactionStatus, TransactionTrace};
use crate::domain::entities::{Block, PrivateBlockMetadata};
use crate::domain::state::WorldState;
use crate::domain::value_objects::{Hash, PrivacyGroupId, PrivacyUserId};
use crate::errors::ReplayError;
use crate::ports::outbound::{
    ChainIndex, GroupMetadataStore, PrivateStateStorage, PrivateTransactionProcessor,
    PrivateTransactionStore,
};
use crate::state_root::PrivateStateRootResolver;
use crate::tracer::ExecutionTracer;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

// =============================================================================
// SNAPSHOT GUARD
// =============================================================================

/// Mutable private state checked out for one replay. Dropping it discards
/// every mutation and returns the checkout.
struct WorldStateSnapshot {
    storage: Arc<dyn PrivateStateStorage>,
    base_root: Hash,
    state: WorldState,
}

impl WorldStateSnapshot {
    async fn checkout(
        storage: &Arc<dyn PrivateStateStorage>,
        root: Hash,
    ) -> Result<Self, ReplayError> {
        let state = storage
            .checkout(&root)
            .await?
            .ok_or(ReplayError::StateUnavailable(root))?;
        Ok(Self {
            storage: Arc::clone(storage),
            base_root: root,
            state,
        })
    }

    fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    fn root(&self) -> Hash {
        self.state.root()
    }
}

impl Drop for WorldStateSnapshot {
    fn drop(&mut self) {
        debug!(base_root = ?self.base_root, "Discarding private state snapshot");
        self.storage.release(&self.base_root);
    }
}

// =============================================================================
// REPLAYER
// =============================================================================

/// Outbound ports the replayer reads from.
#[derive(Clone)]
pub struct ReplayPorts {
    /// Canonical chain.
    pub chain: Arc<dyn ChainIndex>,
    /// Private transaction store.
    pub transactions: Arc<dyn PrivateTransactionStore>,
    /// Group metadata.
    pub metadata: Arc<dyn GroupMetadataStore>,
    /// Durable private state.
    pub storage: Arc<dyn PrivateStateStorage>,
    /// Transaction processor.
    pub processor: Arc<dyn PrivateTransactionProcessor>,
}

/// Replays a block's private transactions for one group.
pub struct StateReplayer {
    transactions: Arc<dyn PrivateTransactionStore>,
    storage: Arc<dyn PrivateStateStorage>,
    processor: Arc<dyn PrivateTransactionProcessor>,
    resolver: PrivateStateRootResolver,
    verify_state_roots: bool,
}

impl StateReplayer {
    /// Creates a replayer.
    #[must_use]
    pub fn new(ports: ReplayPorts, verify_state_roots: bool) -> Self {
        Self {
            resolver: PrivateStateRootResolver::new(ports.chain, ports.metadata),
            transactions: ports.transactions,
            storage: ports.storage,
            processor: ports.processor,
            verify_state_roots,
        }
    }

    /// Replays every private transaction `metadata` lists for `block`.
    ///
    /// Returns one trace per listed transaction, in execution order.
    /// Transactions rejected as invalid are recorded with no call frame and
    /// replay continues.
    ///
    /// # Errors
    ///
    /// Any inconsistency between metadata, block, transaction store and
    /// replayed state aborts the whole block.
    #[instrument(
        skip(self, block, metadata, caller),
        fields(block_hash = %block.hash(), block_number = block.number())
    )]
    pub async fn replay_block(
        &self,
        privacy_group_id: &PrivacyGroupId,
        block: &Block,
        metadata: &PrivateBlockMetadata,
        caller: &PrivacyUserId,
    ) -> Result<Vec<TransactionTrace>, ReplayError> {
        let parent_root = self
            .resolver
            .resolve_parent_state_root(privacy_group_id, &block.header)
            .await?;
        let mut snapshot = WorldStateSnapshot::checkout(&self.storage, parent_root).await?;
        debug!(
            parent_root = ?parent_root,
            transactions = metadata.transactions.len(),
            "Replaying private transactions"
        );

        let mut traces = Vec::with_capacity(metadata.transactions.len());
        for entry in &metadata.transactions {
            if block.transaction_position(&entry.pmt_hash).is_none() {
                return Err(ReplayError::NotInBlock(entry.pmt_hash));
            }

            let executed = self
                .transactions
                .find_by_pmt_hash(&entry.pmt_hash, caller)
                .await?
                .ok_or(ReplayError::UnresolvableTransaction(entry.pmt_hash))?;

            let mut tracer = ExecutionTracer::new();
            let status = self
                .processor
                .process(
                    snapshot.state_mut(),
                    &block.header,
                    &executed.transaction,
                    &mut tracer,
                )
                .map_err(|source| ReplayError::Execution {
                    pmt_hash: entry.pmt_hash,
                    source,
                })?;

            if let TransactionStatus::Invalid { reason } = &status {
                warn!(
                    pmt_hash = ?entry.pmt_hash,
                    reason = %reason,
                    "Private transaction was invalid"
                );
            }

            if self.verify_state_roots {
                let actual = snapshot.root();
                if actual != entry.state_root {
                    return Err(ReplayError::StateRootMismatch {
                        pmt_hash: entry.pmt_hash,
                        expected: entry.state_root,
                        actual,
                    });
                }
            }

            traces.push(TransactionTrace {
                pmt_hash: entry.pmt_hash,
                status,
                root: tracer.finish(),
            });
        }

        Ok(traces)
    }
}

// =============================================================================
// TESTS
// =============================================================================
