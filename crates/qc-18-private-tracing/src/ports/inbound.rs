//! # Driving Ports (API - Inbound)
//!
//! Interface exposed to the RPC layer.

use crate::domain::flat_trace::FlatTraceRecord;
use crate::domain::value_objects::{Hash, PrivacyGroupId, PrivacyUserId};
use crate::errors::TraceError;
use async_trait::async_trait;

/// A trace request with the caller's resolved privacy identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRequest {
    /// Group to replay in.
    pub privacy_group_id: PrivacyGroupId,
    /// Proxy transaction hash.
    pub transaction_hash: Hash,
    /// Privacy identity of the caller.
    pub caller: PrivacyUserId,
}

/// Private transaction trace API.
#[async_trait]
pub trait PrivateTraceApi: Send + Sync {
    /// Flat trace of one private transaction.
    ///
    /// Returns an empty list when the transaction is not visible to the
    /// caller, its block is no longer canonical, or the group has no
    /// metadata for that block.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` when group membership is enforced and the caller is
    ///   not a member
    /// - `TraceReconstruction` when replay cannot reproduce the transaction
    /// - `StorageUnavailable` when a backing store fails
    /// - `Timeout` when the request deadline passes
    async fn result_by_transaction_hash(
        &self,
        request: &TraceRequest,
    ) -> Result<Vec<FlatTraceRecord>, TraceError>;
}
