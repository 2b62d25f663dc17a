//! # Authorization
//!
//! Two concerns, each a strategy picked once from [`AuthorizationMode`]:
//!
//! - [`PrivacyIdProvider`]: which privacy identity a request acts as.
//! - [`AuthorizationGuard`]: whether that identity may trace in a group.
//!
//! | Mode | Caller identity | Membership check |
//! |------|-----------------|------------------|
//! | single tenant | node key | none (store visibility only) |
//! | multi tenant | user's privacy key | current group member |

use crate::config::AuthorizationMode;
use crate::domain::value_objects::{PrivacyGroupId, PrivacyUserId};
use crate::errors::TraceError;
use crate::ports::outbound::PrivacyGroupMembership;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

// =============================================================================
// CALLER IDENTITY
// =============================================================================

/// Identity established by the transport (e.g. a validated JWT).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticatedUser {
    /// User name claim.
    pub username: String,
    /// Privacy public key claim, if the token carries one.
    pub privacy_public_key: Option<PrivacyUserId>,
}

/// Derives the privacy identity a request acts as.
pub trait PrivacyIdProvider: Send + Sync {
    /// Privacy identity for `user`, or None if it cannot be determined.
    fn privacy_user_id(&self, user: Option<&AuthenticatedUser>) -> Option<PrivacyUserId>;
}

/// Single tenant: every request acts as the node.
#[derive(Debug, Clone)]
pub struct NodePrivacyIdProvider {
    node_privacy_user_id: PrivacyUserId,
}

impl NodePrivacyIdProvider {
    /// Creates a provider that always returns `node_privacy_user_id`.
    #[must_use]
    pub fn new(node_privacy_user_id: PrivacyUserId) -> Self {
        Self {
            node_privacy_user_id,
        }
    }
}

impl PrivacyIdProvider for NodePrivacyIdProvider {
    fn privacy_user_id(&self, _user: Option<&AuthenticatedUser>) -> Option<PrivacyUserId> {
        Some(self.node_privacy_user_id.clone())
    }
}

/// Multi tenant: the request acts as the authenticated user's privacy key.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserPrivacyIdProvider;

impl PrivacyIdProvider for UserPrivacyIdProvider {
    fn privacy_user_id(&self, user: Option<&AuthenticatedUser>) -> Option<PrivacyUserId> {
        user.and_then(|u| u.privacy_public_key.clone())
    }
}

// =============================================================================
// MEMBERSHIP GUARD
// =============================================================================

/// Checks whether a caller may trace in a privacy group.
#[async_trait]
pub trait AuthorizationGuard: Send + Sync {
    /// # Errors
    ///
    /// `Unauthorized` when the caller is not allowed, `StorageUnavailable`
    /// when membership cannot be read.
    async fn authorize(
        &self,
        caller: &PrivacyUserId,
        privacy_group_id: &PrivacyGroupId,
    ) -> Result<(), TraceError>;
}

/// Accepts every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTenantGuard;

#[async_trait]
impl AuthorizationGuard for SingleTenantGuard {
    async fn authorize(
        &self,
        _caller: &PrivacyUserId,
        _privacy_group_id: &PrivacyGroupId,
    ) -> Result<(), TraceError> {
        Ok(())
    }
}

/// Requires current membership. A missing group is treated like
/// non-membership.
pub struct MultiTenantGuard {
    membership: Arc<dyn PrivacyGroupMembership>,
}

impl MultiTenantGuard {
    /// Creates a guard over `membership`.
    #[must_use]
    pub fn new(membership: Arc<dyn PrivacyGroupMembership>) -> Self {
        Self { membership }
    }
}

#[async_trait]
impl AuthorizationGuard for MultiTenantGuard {
    async fn authorize(
        &self,
        caller: &PrivacyUserId,
        privacy_group_id: &PrivacyGroupId,
    ) -> Result<(), TraceError> {
        let members = self.membership.members(privacy_group_id).await?;
        let is_member = members.is_some_and(|members| members.contains(caller));
        if is_member {
            return Ok(());
        }

        warn!(
            privacy_group_id = %privacy_group_id,
            caller = %caller,
            "Caller is not a member of the privacy group"
        );
        Err(TraceError::Unauthorized {
            privacy_group_id: privacy_group_id.clone(),
        })
    }
}

/// Builds the guard for `mode`.
#[must_use]
pub fn guard_for(
    mode: AuthorizationMode,
    membership: Arc<dyn PrivacyGroupMembership>,
) -> Arc<dyn AuthorizationGuard> {
    match mode {
        AuthorizationMode::SingleTenant => Arc::new(SingleTenantGuard),
        AuthorizationMode::MultiTenant => Arc::new(MultiTenantGuard::new(membership)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
