//! # Error Types
//!
//! Errors for private trace reconstruction, one enum per layer.

use crate::domain::value_objects::{Hash, PrivacyGroupId};
use thiserror::Error;

// =============================================================================
// STORE ERRORS
// =============================================================================

/// Errors from the external chain, metadata, transaction and state stores.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store did not respond.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store timed out.
    #[error("store timeout")]
    Timeout,

    /// The store returned inconsistent data.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

// =============================================================================
// EXECUTION ERRORS
// =============================================================================

/// Hard faults raised by the transaction processor.
///
/// Unlike an invalid transaction outcome, these never happened during
/// historical processing, so replay cannot continue past them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Interpreter fault.
    #[error("interpreter fault: {0}")]
    Interpreter(String),

    /// Call depth exceeded maximum.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Depth reached.
        depth: usize,
        /// Configured limit.
        max: usize,
    },

    /// State access failed inside execution.
    #[error("state access failed: {0}")]
    State(String),
}

// =============================================================================
// REPLAY ERRORS
// =============================================================================

/// Failures while rebuilding and replaying a block's private state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Metadata referenced a private transaction that cannot be resolved.
    #[error("private transaction {0:?} listed in metadata cannot be resolved")]
    UnresolvableTransaction(Hash),

    /// Metadata referenced a proxy transaction the block does not contain.
    #[error("private transaction {0:?} is not part of the block")]
    NotInBlock(Hash),

    /// An ancestor header needed to resolve the parent state root is missing.
    #[error("ancestor block {0:?} not found")]
    MissingAncestor(Hash),

    /// The group head index points at a block without group metadata.
    #[error("group head block {0:?} has no private metadata")]
    MissingGroupMetadata(Hash),

    /// No indexed or recorded ancestor within the walk limit.
    #[error("no private state root within {limit} ancestors of {from:?}")]
    AncestorWalkExceeded {
        /// Block the walk started from.
        from: Hash,
        /// Maximum number of ancestors visited.
        limit: u64,
    },

    /// The parent private state is not available in storage.
    #[error("private state {0:?} not available")]
    StateUnavailable(Hash),

    /// The processor faulted while executing a transaction.
    #[error("execution of {pmt_hash:?} failed: {source}")]
    Execution {
        /// Proxy transaction being replayed.
        pmt_hash: Hash,
        /// Processor fault.
        #[source]
        source: ExecutionError,
    },

    /// Replay produced a different state than the one recorded.
    #[error(
        "state root mismatch after {pmt_hash:?}: recorded {expected:?}, replayed {actual:?}"
    )]
    StateRootMismatch {
        /// Proxy transaction after which the roots diverged.
        pmt_hash: Hash,
        /// Root recorded when the block was first processed.
        expected: Hash,
        /// Root produced by replay.
        actual: Hash,
    },

    /// Metadata promised a transaction that replay did not produce.
    #[error("transaction {0:?} not produced by block replay")]
    TransactionNotReplayed(Hash),

    /// A store failed during replay.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

// =============================================================================
// TRACE ERRORS (service boundary)
// =============================================================================

/// Errors surfaced to callers of the trace service.
///
/// Unknown or hidden transactions are not errors; they produce an empty
/// result instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// Caller is not a member of the requested privacy group.
    #[error("privacy user is not a member of privacy group {privacy_group_id}")]
    Unauthorized {
        /// Group the caller tried to read.
        privacy_group_id: PrivacyGroupId,
    },

    /// Replay could not reproduce the requested transaction.
    #[error(
        "trace reconstruction failed for {pmt_hash:?} in block {block_hash:?} \
         (privacy group {privacy_group_id}): {source}"
    )]
    TraceReconstruction {
        /// Requested privacy group.
        privacy_group_id: PrivacyGroupId,
        /// Block being replayed.
        block_hash: Hash,
        /// Requested proxy transaction.
        pmt_hash: Hash,
        /// Replay failure.
        #[source]
        source: ReplayError,
    },

    /// A backing store failed to respond.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// The request exceeded its deadline.
    #[error("trace request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },

    /// Malformed request parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),
}

// =============================================================================
// TESTS
// =============================================================================
