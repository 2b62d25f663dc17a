//! # Private Trace Service
//!
//! Orchestrates one trace request:
//!
//! ```text
//! Authorizing → Resolving → LocatingBlock → ReplayingState → Selecting → Flattening
//!                   │             │
//!                   └─────────────┴──→ Empty
//! ```
//!
//! Unknown, hidden, reorged-out, or metadata-less transactions produce an
//! empty result. Authorization failures, replay inconsistencies, storage
//! failures and timeouts are errors.

use crate::auth::{guard_for, AuthorizationGuard};
use crate::config::{ConfigError, TraceConfig};
use crate::domain::call_tree::select_transaction_trace;
use crate::domain::entities::Block;
use crate::domain::flat_trace::{FlatTraceContext, FlatTraceGenerator, FlatTraceRecord};
use crate::errors::{ReplayError, TraceError};
use crate::ports::inbound::{PrivateTraceApi, TraceRequest};
use crate::ports::outbound::{
    ChainIndex, GroupMetadataStore, PrivacyGroupMembership, PrivateStateStorage,
    PrivateTransactionProcessor, PrivateTransactionStore,
};
use crate::replay::{ReplayPorts, StateReplayer};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Statistics for the trace service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TraceStats {
    /// Requests received.
    pub requests: u64,
    /// Requests answered with a non-empty trace.
    pub traced: u64,
    /// Replayed transactions that produced no frames (invalid at execution).
    pub untraced_invalid: u64,
    /// Requests answered with an empty result.
    pub empty: u64,
    /// Requests rejected by the authorization guard.
    pub unauthorized: u64,
    /// Replays that could not reproduce the transaction.
    pub reconstruction_failures: u64,
    /// Requests failed by a backing store.
    pub storage_failures: u64,
    /// Requests that ran out of time.
    pub timeouts: u64,
}

/// Outbound ports the service depends on.
#[derive(Clone)]
pub struct TracePorts {
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
    /// Privacy group membership.
    pub membership: Arc<dyn PrivacyGroupMembership>,
}

/// Why a request produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Unknown transaction, or not decryptable by the caller.
    NotVisible,
    /// The transaction executed in a different privacy group.
    OtherGroup,
    /// No canonical block at the executing height holds the transaction.
    NotCanonical,
    /// The canonical block body is missing.
    BlockMissing,
    /// The group has no metadata for the block.
    NoMetadata,
}

impl EmptyReason {
    /// Short label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotVisible => "not_visible",
            Self::OtherGroup => "other_group",
            Self::NotCanonical => "not_canonical",
            Self::BlockMissing => "block_missing",
            Self::NoMetadata => "no_metadata",
        }
    }
}

enum TraceOutcome {
    Done(Vec<FlatTraceRecord>),
    Empty(EmptyReason),
}

/// The private trace service.
pub struct TraceQueryService {
    config: TraceConfig,
    chain: Arc<dyn ChainIndex>,
    transactions: Arc<dyn PrivateTransactionStore>,
    metadata: Arc<dyn GroupMetadataStore>,
    guard: Arc<dyn AuthorizationGuard>,
    replayer: StateReplayer,
    stats: Arc<RwLock<TraceStats>>,
}

impl TraceQueryService {
    /// Create a new trace service.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` does not validate.
    pub fn new(ports: TracePorts, config: TraceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let replayer = StateReplayer::new(
            ReplayPorts {
                chain: Arc::clone(&ports.chain),
                transactions: Arc::clone(&ports.transactions),
                metadata: Arc::clone(&ports.metadata),
                storage: ports.storage,
                processor: ports.processor,
            },
            config.verify_state_roots,
        );

        Ok(Self {
            guard: guard_for(config.authorization, ports.membership),
            chain: ports.chain,
            transactions: ports.transactions,
            metadata: ports.metadata,
            replayer,
            stats: Arc::new(RwLock::new(TraceStats::default())),
            config,
        })
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> TraceStats {
        self.stats.read().await.clone()
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    async fn trace(&self, request: &TraceRequest) -> Result<TraceOutcome, TraceError> {
        let pmt_hash = request.transaction_hash;
        let group = &request.privacy_group_id;

        self.guard.authorize(&request.caller, group).await?;

        let Some(executed) = self
            .transactions
            .find_by_pmt_hash(&pmt_hash, &request.caller)
            .await?
        else {
            return Ok(TraceOutcome::Empty(EmptyReason::NotVisible));
        };
        if executed.privacy_group_id() != group {
            return Ok(TraceOutcome::Empty(EmptyReason::OtherGroup));
        }

        let Some(block_hash) = self.chain.block_hash_by_number(executed.block_number).await? else {
            return Ok(TraceOutcome::Empty(EmptyReason::NotCanonical));
        };
        let Some(block) = self.chain.block_by_hash(&block_hash).await? else {
            return Ok(TraceOutcome::Empty(EmptyReason::BlockMissing));
        };
        let Some(transaction_position) = block.transaction_position(&pmt_hash) else {
            return Ok(TraceOutcome::Empty(EmptyReason::NotCanonical));
        };
        let Some(metadata) = self
            .metadata
            .private_block_metadata(group, &block_hash)
            .await?
        else {
            return Ok(TraceOutcome::Empty(EmptyReason::NoMetadata));
        };

        let traces = self
            .replayer
            .replay_block(group, &block, &metadata, &request.caller)
            .await
            .map_err(|source| Self::replay_failure(request, &block, source))?;

        let trace = select_transaction_trace(traces, &pmt_hash).ok_or_else(|| {
            Self::replay_failure(request, &block, ReplayError::TransactionNotReplayed(pmt_hash))
        })?;

        let context = FlatTraceContext {
            block_hash: block.hash(),
            block_number: block.number(),
            transaction_hash: pmt_hash,
            transaction_position: Some(transaction_position),
        };
        Ok(TraceOutcome::Done(FlatTraceGenerator::generate(&trace, &context)))
    }

    fn replay_failure(request: &TraceRequest, block: &Block, source: ReplayError) -> TraceError {
        if let ReplayError::Storage(store) = source {
            return TraceError::StorageUnavailable(store);
        }
        error!(
            block_hash = %block.hash(),
            privacy_group_id = %request.privacy_group_id,
            pmt_hash = %request.transaction_hash,
            error = %source,
            "Trace reconstruction failed"
        );
        TraceError::TraceReconstruction {
            privacy_group_id: request.privacy_group_id.clone(),
            block_hash: block.hash(),
            pmt_hash: request.transaction_hash,
            source,
        }
    }

    async fn record(&self, result: &Result<TraceOutcome, TraceError>) {
        let mut stats = self.stats.write().await;
        stats.requests += 1;
        match result {
            Ok(TraceOutcome::Done(records)) if records.is_empty() => stats.untraced_invalid += 1,
            Ok(TraceOutcome::Done(_)) => stats.traced += 1,
            Ok(TraceOutcome::Empty(_)) => stats.empty += 1,
            Err(TraceError::Unauthorized { .. }) => stats.unauthorized += 1,
            Err(TraceError::TraceReconstruction { .. }) => stats.reconstruction_failures += 1,
            Err(TraceError::StorageUnavailable(_)) => stats.storage_failures += 1,
            Err(TraceError::Timeout { .. }) => stats.timeouts += 1,
            Err(TraceError::InvalidParams(_)) => {}
        }
    }
}

#[async_trait]
impl PrivateTraceApi for TraceQueryService {
    #[instrument(
        skip(self, request),
        fields(
            request_id = %Uuid::new_v4(),
            privacy_group_id = %request.privacy_group_id,
            pmt_hash = %request.transaction_hash,
        )
    )]
    async fn result_by_transaction_hash(
        &self,
        request: &TraceRequest,
    ) -> Result<Vec<FlatTraceRecord>, TraceError> {
        let start = Instant::now();
        let timeout = self.config.request_timeout();

        let result = match tokio::time::timeout(timeout, self.trace(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.config.request_timeout_ms, "Trace request timed out");
                Err(TraceError::Timeout {
                    timeout_ms: self.config.request_timeout_ms,
                })
            }
        };
        self.record(&result).await;

        let elapsed_ms = start.elapsed().as_millis();
        match result {
            Ok(TraceOutcome::Done(records)) => {
                info!(records = records.len(), elapsed_ms, "Private transaction traced");
                Ok(records)
            }
            Ok(TraceOutcome::Empty(reason)) => {
                debug!(reason = reason.as_str(), "No trace for private transaction");
                Ok(Vec::new())
            }
            Err(err) => {
                if let TraceError::StorageUnavailable(store) = &err {
                    warn!(error = %store, "Trace request failed on storage");
                }
                Err(err)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
