//! # QC-18 Private Tracing - Privacy Group Call Traces
//!
//! **Subsystem ID:** 18
//! **RPC Method:** `priv_traceTransaction`
//!
//! ## Purpose
//!
//! Reconstructs the call trace of a private transaction for a member of its
//! privacy group. Private execution results are never persisted, so every
//! trace is rebuilt by replaying the private transactions of the containing
//! block, for that group only, against a throwaway copy of the group's
//! private state as of the parent block.
//!
//! ## Pipeline
//!
//! ```text
//! request ──► authorize ──► locate pmt ──► canonical block ──► group metadata
//!                                                                   │
//!   JSON ◄── flatten ◄── select pmt ◄── replay (snapshot) ◄──────────┘
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Group isolation | `service.rs` - only the requested group's metadata is replayed |
//! | Non-persistence | `replay.rs` - `WorldStateSnapshot` releases on drop, never commits |
//! | Authorization first | `service.rs` - guard runs before any lookup |
//! | Canonical only | `service.rs` - orphaned blocks yield an empty result |
//! | Determinism | `domain/flat_trace.rs` - depth-first, ordered child traversal |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `ChainIndex` | Canonical block lookup |
//! | `PrivateTransactionStore` | Decrypt private transaction by proxy hash |
//! | `GroupMetadataStore` | Per-block private transaction list and state roots |
//! | `PrivateStateStorage` | Historical private world states |
//! | `PrivateTransactionProcessor` | Execution with tracer hooks |
//! | `PrivacyGroupMembership` | Multi-tenant authorization |
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_18_private_tracing::prelude::*;
//!
//! let service = Arc::new(TraceQueryService::new(ports, config.clone())?);
//! let method = PrivTraceTransaction::for_config(service, &config)?;
//!
//! let traces = method
//!     .response(&json!([group_id, pmt_hash]), Some(&user))
//!     .await?;
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod replay;
pub mod rpc;
pub mod service;
pub mod state_root;
pub mod tracer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain
    pub use crate::domain::call_tree::{
        select_transaction_trace, CallFrame, CallKind, TransactionStatus, TransactionTrace,
    };
    pub use crate::domain::entities::{
        Block, BlockHeader, ExecutedPrivateTransaction, PrivacyGroupHeadBlockMap,
        PrivateBlockMetadata, PrivateTransaction, PrivateTransactionMetadata,
    };
    pub use crate::domain::flat_trace::{
        Action, FlatTraceContext, FlatTraceGenerator, FlatTraceRecord, TraceOutput,
    };
    pub use crate::domain::services::{compute_contract_address, empty_state_root, keccak256};
    pub use crate::domain::state::{Account, WorldState};
    pub use crate::domain::value_objects::{
        Address, Bytes, Hash, PrivacyGroupId, PrivacyUserId, U256,
    };

    // Ports
    pub use crate::ports::inbound::{PrivateTraceApi, TraceRequest};
    pub use crate::ports::outbound::{
        ChainIndex, FrameEnter, FrameExit, GroupMetadataStore, NoopTracer, PrivacyGroupMembership,
        PrivateStateStorage, PrivateTransactionProcessor, PrivateTransactionStore, TracerHook,
    };

    // Errors
    pub use crate::errors::{ExecutionError, ReplayError, StoreError, TraceError};

    // Adapters
    pub use crate::adapters::{
        BasicMessageProcessor, InMemoryChain, InMemoryGroupMetadataStore, InMemoryPrivacyGroups,
        InMemoryPrivateStateStorage, InMemoryPrivateTransactionStore,
    };

    // Service
    pub use crate::auth::{
        guard_for, AuthenticatedUser, AuthorizationGuard, NodePrivacyIdProvider,
        PrivacyIdProvider, UserPrivacyIdProvider,
    };
    pub use crate::config::{AuthorizationMode, ConfigError, TraceConfig};
    pub use crate::replay::{ReplayPorts, StateReplayer};
    pub use crate::rpc::{codes, PrivTraceTransaction, RpcError};
    pub use crate::service::{EmptyReason, TracePorts, TraceQueryService, TraceStats};
    pub use crate::state_root::PrivateStateRootResolver;
    pub use crate::tracer::ExecutionTracer;
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 18;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "Private Tracing";

// =============================================================================
// TESTS
// =============================================================================
