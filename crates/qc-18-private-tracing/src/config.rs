//! Trace service configuration with validation.

use crate::domain::value_objects::PrivacyUserId;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// How caller identity maps to group membership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// One privacy identity per node. Membership is not checked; the private
    /// transaction store's visibility rules apply.
    #[default]
    SingleTenant,
    /// Many users per node. The caller must be a current group member.
    MultiTenant,
}

/// Private trace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Authorization strategy.
    pub authorization: AuthorizationMode,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Compare replayed state roots with the recorded ones.
    pub verify_state_roots: bool,
    /// The node's own privacy identity. Caller identity in single-tenant mode.
    pub node_privacy_user_id: Option<PrivacyUserId>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            authorization: AuthorizationMode::SingleTenant,
            request_timeout_ms: 30_000,
            verify_state_roots: true,
            node_privacy_user_id: None,
        }
    }
}

impl TraceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_PRIVACY_MULTI_TENANCY`: Enable multi-tenant authorization (default: false)
    /// - `QC_TRACE_TIMEOUT_MS`: Request timeout (default: 30000)
    /// - `QC_TRACE_VERIFY_STATE_ROOTS`: Verify replayed roots (default: true)
    /// - `QC_PRIVACY_PUBLIC_KEY`: Node privacy identity (no default)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |v: String| v.to_lowercase() == "true" || v == "1";

        Self {
            authorization: match lookup("QC_PRIVACY_MULTI_TENANCY").map(flag) {
                Some(true) => AuthorizationMode::MultiTenant,
                _ => AuthorizationMode::SingleTenant,
            },

            request_timeout_ms: lookup("QC_TRACE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),

            verify_state_roots: lookup("QC_TRACE_VERIFY_STATE_ROOTS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.verify_state_roots),

            node_privacy_user_id: lookup("QC_PRIVACY_PUBLIC_KEY")
                .filter(|v| !v.is_empty())
                .map(PrivacyUserId::new),
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a zero timeout or a single-tenant node
    /// without its own privacy identity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout_ms cannot be 0".into(),
            ));
        }

        if self.authorization == AuthorizationMode::SingleTenant
            && self.node_privacy_user_id.is_none()
        {
            return Err(ConfigError::MissingNodePrivacyId);
        }

        Ok(())
    }

    /// Request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Single-tenant mode needs the node's privacy identity
    #[error("single-tenant mode requires a node privacy public key")]
    MissingNodePrivacyId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TraceConfig::default();
        assert_eq!(config.authorization, AuthorizationMode::SingleTenant);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert!(config.verify_state_roots);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup() {
        let config = TraceConfig::from_lookup(lookup(&[
            ("QC_PRIVACY_MULTI_TENANCY", "true"),
            ("QC_TRACE_TIMEOUT_MS", "1500"),
            ("QC_TRACE_VERIFY_STATE_ROOTS", "0"),
            ("QC_PRIVACY_PUBLIC_KEY", "A1aVtMxLCUHmBVHXoZzzBgPbW/wj5axDpW9X8l91SGo="),
        ]));

        assert_eq!(config.authorization, AuthorizationMode::MultiTenant);
        assert_eq!(config.request_timeout_ms, 1500);
        assert!(!config.verify_state_roots);
        assert_eq!(
            config.node_privacy_user_id.as_ref().map(PrivacyUserId::as_str),
            Some("A1aVtMxLCUHmBVHXoZzzBgPbW/wj5axDpW9X8l91SGo=")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_values_fall_back_to_defaults() {
        let config = TraceConfig::from_lookup(lookup(&[("QC_TRACE_TIMEOUT_MS", "soon")]));
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.authorization, AuthorizationMode::SingleTenant);
    }

    #[test]
    fn test_validation() {
        let mut config = TraceConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingNodePrivacyId));

        config.node_privacy_user_id = Some(PrivacyUserId::new("node"));
        assert!(config.validate().is_ok());

        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));

        let multi = TraceConfig {
            authorization: AuthorizationMode::MultiTenant,
            ..TraceConfig::default()
        };
        assert!(multi.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TraceConfig =
            serde_json::from_str(r#"{"authorization":"multi_tenant"}"#).unwrap();
        assert_eq!(config.authorization, AuthorizationMode::MultiTenant);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
