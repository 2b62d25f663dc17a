//! `priv_traceTransaction` JSON-RPC method with JSON-RPC 2.0 error codes.
//!
//! Params: `[privacyGroupId, transactionHash]`. Result: array of flat trace
//! records (possibly empty).

use crate::auth::{
    AuthenticatedUser, NodePrivacyIdProvider, PrivacyIdProvider, UserPrivacyIdProvider,
};
use crate::config::{AuthorizationMode, ConfigError, TraceConfig};
use crate::domain::value_objects::{Hash, PrivacyGroupId};
use crate::errors::TraceError;
use crate::ports::inbound::{PrivateTraceApi, TraceRequest};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// JSON-RPC error codes used by this method.
pub mod codes {
    /// Malformed params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Trace reconstruction failed.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// A backing store could not be read.
    pub const RESOURCE_UNAVAILABLE: i32 = -32002;
    /// Request exceeded its deadline.
    pub const TIMEOUT: i32 = -32006;
    /// Caller may not read the privacy group.
    pub const UNAUTHORIZED: i32 = -32010;
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create a new RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid parameters
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<TraceError> for RpcError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::InvalidParams(details) => Self::invalid_params(details),
            TraceError::Unauthorized { .. } => Self::new(codes::UNAUTHORIZED, "Unauthorized"),
            TraceError::TraceReconstruction { .. } => {
                Self::new(codes::INTERNAL_ERROR, "Internal error: trace reconstruction failed")
            }
            TraceError::StorageUnavailable(store) => Self::new(
                codes::RESOURCE_UNAVAILABLE,
                format!("Resource unavailable: {store}"),
            ),
            TraceError::Timeout { timeout_ms } => Self::new(
                codes::TIMEOUT,
                format!("Request timeout: priv_traceTransaction after {timeout_ms}ms"),
            ),
        }
    }
}

/// `priv_traceTransaction` handler.
pub struct PrivTraceTransaction {
    api: Arc<dyn PrivateTraceApi>,
    privacy_id_provider: Arc<dyn PrivacyIdProvider>,
}

impl PrivTraceTransaction {
    /// JSON-RPC method name.
    pub const METHOD_NAME: &'static str = "priv_traceTransaction";

    /// Creates the handler.
    #[must_use]
    pub fn new(
        api: Arc<dyn PrivateTraceApi>,
        privacy_id_provider: Arc<dyn PrivacyIdProvider>,
    ) -> Self {
        Self {
            api,
            privacy_id_provider,
        }
    }

    /// Creates the handler with the identity strategy `config` selects.
    ///
    /// # Errors
    ///
    /// `MissingNodePrivacyId` in single-tenant mode without a node key.
    pub fn for_config(
        api: Arc<dyn PrivateTraceApi>,
        config: &TraceConfig,
    ) -> Result<Self, ConfigError> {
        let provider: Arc<dyn PrivacyIdProvider> = match config.authorization {
            AuthorizationMode::SingleTenant => {
                let node = config
                    .node_privacy_user_id
                    .clone()
                    .ok_or(ConfigError::MissingNodePrivacyId)?;
                Arc::new(NodePrivacyIdProvider::new(node))
            }
            AuthorizationMode::MultiTenant => Arc::new(UserPrivacyIdProvider),
        };
        Ok(Self::new(api, provider))
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        Self::METHOD_NAME
    }

    /// Handles one call.
    ///
    /// # Errors
    ///
    /// Returns the JSON-RPC error for malformed params or a failed trace.
    #[instrument(skip(self, params, user), fields(method = Self::METHOD_NAME))]
    pub async fn response(
        &self,
        params: &Value,
        user: Option<&AuthenticatedUser>,
    ) -> Result<Value, RpcError> {
        let (privacy_group_id, transaction_hash) = parse_params(params)?;

        let caller = self
            .privacy_id_provider
            .privacy_user_id(user)
            .ok_or_else(|| TraceError::Unauthorized {
                privacy_group_id: privacy_group_id.clone(),
            })?;

        let records = self
            .api
            .result_by_transaction_hash(&TraceRequest {
                privacy_group_id,
                transaction_hash,
                caller,
            })
            .await?;

        serde_json::to_value(records)
            .map_err(|e| RpcError::new(codes::INTERNAL_ERROR, e.to_string()))
    }
}

fn parse_params(params: &Value) -> Result<(PrivacyGroupId, Hash), TraceError> {
    let invalid = |details: &str| TraceError::InvalidParams(details.to_string());

    let [group, hash] = params
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid("expected [privacyGroupId, transactionHash]"))?
    else {
        return Err(invalid("expected exactly 2 params"));
    };

    let group = group
        .as_str()
        .filter(|g| !g.is_empty())
        .ok_or_else(|| invalid("privacyGroupId must be a non-empty string"))?;
    let hash = hash
        .as_str()
        .ok_or_else(|| invalid("transactionHash must be a string"))?
        .parse::<Hash>()
        .map_err(|e| TraceError::InvalidParams(format!("transactionHash: {e}")))?;

    Ok((PrivacyGroupId::new(group), hash))
}

// =============================================================================
// TESTS
// =============================================================================
