//! # Private State Root Resolution
//!
//! Finds the private state root a group had at the end of a given block:
//! the root recorded for the last private transaction of the nearest block
//! (walking back through ancestors) in which the group executed anything.
//! Groups that never executed anything up to genesis have the empty root.
//!
//! When the metadata store keeps a group head index the answer comes from a
//! single index lookup. Otherwise ancestors are walked, up to a limit.

use crate::domain::entities::{BlockHeader, PrivacyGroupHeadBlockMap};
use crate::domain::services::empty_state_root;
use crate::domain::value_objects::{Hash, PrivacyGroupId};
use crate::errors::ReplayError;
use crate::ports::outbound::{ChainIndex, GroupMetadataStore};
use std::sync::Arc;
use tracing::trace;

/// Ancestors visited before giving up when no head index is available.
pub const DEFAULT_MAX_ANCESTOR_WALK: u64 = 65_536;

/// Resolves private state roots from group metadata and block ancestry.
#[derive(Clone)]
pub struct PrivateStateRootResolver {
    chain: Arc<dyn ChainIndex>,
    metadata: Arc<dyn GroupMetadataStore>,
    max_ancestor_walk: u64,
}

impl PrivateStateRootResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainIndex>, metadata: Arc<dyn GroupMetadataStore>) -> Self {
        Self {
            chain,
            metadata,
            max_ancestor_walk: DEFAULT_MAX_ANCESTOR_WALK,
        }
    }

    /// Overrides the ancestor walk limit.
    #[must_use]
    pub fn with_max_ancestor_walk(mut self, limit: u64) -> Self {
        self.max_ancestor_walk = limit;
        self
    }

    /// Root the group's state had before `header`'s private transactions ran.
    ///
    /// # Errors
    ///
    /// `MissingAncestor` when the ancestry is broken, `MissingGroupMetadata`
    /// when the head index is inconsistent, `AncestorWalkExceeded` past the
    /// walk limit, `Storage` on store failures.
    pub async fn resolve_parent_state_root(
        &self,
        privacy_group_id: &PrivacyGroupId,
        header: &BlockHeader,
    ) -> Result<Hash, ReplayError> {
        if header.is_genesis() {
            return Ok(empty_state_root());
        }
        self.resolve_last_state_root(privacy_group_id, &header.parent_hash)
            .await
    }

    /// Root the group's state had after all private transactions of
    /// `block_hash` ran.
    ///
    /// # Errors
    ///
    /// `MissingAncestor` when the ancestry is broken, `MissingGroupMetadata`
    /// when the head index is inconsistent, `AncestorWalkExceeded` past the
    /// walk limit, `Storage` on store failures.
    pub async fn resolve_last_state_root(
        &self,
        privacy_group_id: &PrivacyGroupId,
        block_hash: &Hash,
    ) -> Result<Hash, ReplayError> {
        let mut current = *block_hash;
        for _ in 0..=self.max_ancestor_walk {
            if let Some(heads) = self.metadata.privacy_group_head_map(&current).await? {
                return self.resolve_from_head(privacy_group_id, &heads).await;
            }

            let recorded = self
                .metadata
                .private_block_metadata(privacy_group_id, &current)
                .await?
                .and_then(|metadata| metadata.latest_state_root());
            if let Some(root) = recorded {
                trace!(block_hash = ?current, root = ?root, "Resolved private state root");
                return Ok(root);
            }

            let header = self
                .chain
                .block_header_by_hash(&current)
                .await?
                .ok_or(ReplayError::MissingAncestor(current))?;
            if header.is_genesis() {
                return Ok(empty_state_root());
            }
            current = header.parent_hash;
        }

        Err(ReplayError::AncestorWalkExceeded {
            from: *block_hash,
            limit: self.max_ancestor_walk,
        })
    }

    async fn resolve_from_head(
        &self,
        privacy_group_id: &PrivacyGroupId,
        heads: &PrivacyGroupHeadBlockMap,
    ) -> Result<Hash, ReplayError> {
        let Some(head) = heads.get(privacy_group_id) else {
            return Ok(empty_state_root());
        };
        let root = self
            .metadata
            .private_block_metadata(privacy_group_id, &head)
            .await?
            .and_then(|metadata| metadata.latest_state_root())
            .ok_or(ReplayError::MissingGroupMetadata(head))?;
        trace!(head = ?head, root = ?root, "Resolved private state root from head index");
        Ok(root)
    }
}
