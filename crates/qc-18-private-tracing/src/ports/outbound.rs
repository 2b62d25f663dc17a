//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the trace pipeline depends on. All of them are read-only from
//! the pipeline's point of view: nothing here writes to the chain, the
//! metadata store or durable private state.

use crate::domain::call_tree::{CallKind, TransactionStatus};
use crate::domain::entities::{
    Block, BlockHeader, ExecutedPrivateTransaction, PrivacyGroupHeadBlockMap, PrivateBlockMetadata,
    PrivateTransaction,
};
use crate::domain::state::WorldState;
use crate::domain::value_objects::{Address, Bytes, Hash, PrivacyGroupId, PrivacyUserId, U256};
use crate::errors::{ExecutionError, StoreError};
use async_trait::async_trait;

// =============================================================================
// CHAIN INDEX
// =============================================================================

/// Read-only view of the canonical public chain.
#[async_trait]
pub trait ChainIndex: Send + Sync {
    /// Canonical block hash at `number`, or None if no canonical block exists
    /// at that height.
    async fn block_hash_by_number(&self, number: u64) -> Result<Option<Hash>, StoreError>;

    /// Block body and header by hash.
    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError>;

    /// Header only, used when walking ancestors.
    async fn block_header_by_hash(&self, hash: &Hash) -> Result<Option<BlockHeader>, StoreError>;
}

// =============================================================================
// PRIVATE TRANSACTION STORE
// =============================================================================

/// Decrypted private transactions, as seen by a specific caller.
///
/// ## Implementation Notes
///
/// Returns None both when the transaction never existed and when the caller
/// may not decrypt it. Callers must not be able to tell the two apart.
#[async_trait]
pub trait PrivateTransactionStore: Send + Sync {
    /// Looks up a private transaction by its proxy transaction hash.
    async fn find_by_pmt_hash(
        &self,
        pmt_hash: &Hash,
        caller: &PrivacyUserId,
    ) -> Result<Option<ExecutedPrivateTransaction>, StoreError>;
}

// =============================================================================
// GROUP METADATA STORE
// =============================================================================

/// Per-group private block metadata written when blocks were first processed.
#[async_trait]
pub trait GroupMetadataStore: Send + Sync {
    /// Metadata for `privacy_group_id` in block `block_hash`, if the group
    /// executed anything in that block.
    async fn private_block_metadata(
        &self,
        privacy_group_id: &PrivacyGroupId,
        block_hash: &Hash,
    ) -> Result<Option<PrivateBlockMetadata>, StoreError>;

    /// Group head index as of `block_hash`. Stores without the index return
    /// None and resolution falls back to walking block ancestry.
    async fn privacy_group_head_map(
        &self,
        _block_hash: &Hash,
    ) -> Result<Option<PrivacyGroupHeadBlockMap>, StoreError> {
        Ok(None)
    }
}

// =============================================================================
// PRIVACY GROUP MEMBERSHIP
// =============================================================================

/// Current membership of privacy groups.
#[async_trait]
pub trait PrivacyGroupMembership: Send + Sync {
    /// Members of `privacy_group_id`, or None if the group does not exist.
    async fn members(
        &self,
        privacy_group_id: &PrivacyGroupId,
    ) -> Result<Option<Vec<PrivacyUserId>>, StoreError>;
}

// =============================================================================
// PRIVATE STATE STORAGE
// =============================================================================

/// Durable private world states keyed by state root.
///
/// `checkout` hands out a detached mutable copy. Mutations to the copy never
/// reach durable storage. Every successful checkout is paired with exactly
/// one `release` for the same root.
#[async_trait]
pub trait PrivateStateStorage: Send + Sync {
    /// Detached copy of the state at `root`, or None if it is not stored.
    async fn checkout(&self, root: &Hash) -> Result<Option<WorldState>, StoreError>;

    /// Returns a checked out copy. Infallible so it can run from `Drop`.
    fn release(&self, root: &Hash);
}

// =============================================================================
// TRANSACTION PROCESSOR
// =============================================================================

/// Frame entry reported to a [`TracerHook`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameEnter {
    /// Frame kind.
    pub kind: CallKind,
    /// Caller.
    pub from: Address,
    /// Callee or created address.
    pub to: Option<Address>,
    /// Value transferred.
    pub value: U256,
    /// Calldata or init code.
    pub input: Bytes,
    /// Gas provided.
    pub gas: u64,
}

/// Frame exit reported to a [`TracerHook`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameExit {
    /// Return data or deployed code.
    pub output: Bytes,
    /// Gas consumed.
    pub gas_used: u64,
    /// Failure description.
    pub error: Option<String>,
    /// Revert data.
    pub revert_reason: Option<Bytes>,
    /// Address assigned by a create frame, when only known at exit.
    pub created_address: Option<Address>,
}

/// Instrumentation callbacks invoked by the processor during execution.
///
/// Hooks observe execution only. They cannot fail and cannot change the
/// outcome.
pub trait TracerHook: Send {
    /// A call or create frame starts.
    fn on_enter(&mut self, frame: FrameEnter);

    /// The innermost open frame ends.
    fn on_exit(&mut self, frame: FrameExit);

    /// `address` self-destructs, sending `balance` to `beneficiary`.
    fn on_self_destruct(&mut self, address: Address, beneficiary: Address, balance: U256);
}

/// Hook that records nothing. Used for historical processing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl TracerHook for NoopTracer {
    fn on_enter(&mut self, _frame: FrameEnter) {}
    fn on_exit(&mut self, _frame: FrameExit) {}
    fn on_self_destruct(&mut self, _address: Address, _beneficiary: Address, _balance: U256) {}
}

/// Executes a private transaction against a world state.
///
/// ## Contract
///
/// - `Ok(Successful)` / `Ok(Reverted)`: the transaction ran; `state` reflects
///   its committed effects (for a revert, only the nonce bump).
/// - `Ok(Invalid)`: rejected before execution; `state` is untouched and no
///   frame was reported.
/// - `Err(_)`: interpreter fault; `state` is unspecified.
///
/// Execution is deterministic in `(state, header, transaction)`.
pub trait PrivateTransactionProcessor: Send + Sync {
    /// Processes one transaction, reporting frames to `tracer`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` on interpreter faults.
    fn process(
        &self,
        state: &mut WorldState,
        header: &BlockHeader,
        transaction: &PrivateTransaction,
        tracer: &mut dyn TracerHook,
    ) -> Result<TransactionStatus, ExecutionError>;
}
