use super::{LineOrdering, ReconcileMode};
use crate::core::{CartError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cart engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Authenticated user whose remote cart the engine drives
    pub user_id: UserId,

    /// How overlapping mutations of the same line are ordered
    pub line_ordering: LineOrdering,

    /// How add/refresh snapshots are folded into local state
    pub reconcile_mode: ReconcileMode,

    /// Upper bound on a single gateway call, in milliseconds
    pub gateway_timeout_ms: Option<u64>,

    /// Emit an info notice when an add succeeds
    pub notify_on_success: bool,
}

impl EngineConfig {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: UserId::new(user_id),
            line_ordering: LineOrdering::Overlapping,
            reconcile_mode: ReconcileMode::ReplaceAll,
            gateway_timeout_ms: Some(15_000),
            notify_on_success: true,
        }
    }

    pub fn line_ordering(mut self, ordering: LineOrdering) -> Self {
        self.line_ordering = ordering;
        self
    }

    pub fn reconcile_mode(mut self, mode: ReconcileMode) -> Self {
        self.reconcile_mode = mode;
        self
    }

    pub fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn without_gateway_timeout(mut self) -> Self {
        self.gateway_timeout_ms = None;
        self
    }

    pub fn notify_on_success(mut self, enabled: bool) -> Self {
        self.notify_on_success = enabled;
        self
    }

    pub fn gateway_timeout_duration(&self) -> Option<Duration> {
        self.gateway_timeout_ms.map(Duration::from_millis)
    }

    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| CartError::config(format!("Invalid engine config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(CartError::config("user_id cannot be empty"));
        }

        if self.gateway_timeout_ms == Some(0) {
            return Err(CartError::config("gateway_timeout_ms must be > 0"));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("guest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.user_id.as_str(), "guest");
        assert_eq!(config.line_ordering, LineOrdering::Overlapping);
        assert_eq!(config.reconcile_mode, ReconcileMode::ReplaceAll);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new("u42")
            .line_ordering(LineOrdering::Serialized)
            .reconcile_mode(ReconcileMode::MergePresent)
            .gateway_timeout(Duration::from_secs(2));

        assert_eq!(config.line_ordering, LineOrdering::Serialized);
        assert_eq!(config.reconcile_mode, ReconcileMode::MergePresent);
        assert_eq!(config.gateway_timeout_duration(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            EngineConfig::from_json(r#"{"user_id": "u7", "line_ordering": "serialized"}"#)
                .unwrap();
        assert_eq!(config.user_id.as_str(), "u7");
        assert_eq!(config.line_ordering, LineOrdering::Serialized);
        assert_eq!(config.reconcile_mode, ReconcileMode::ReplaceAll);
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::new("").validate().is_err());
        assert!(
            EngineConfig::from_json(r#"{"user_id": "u1", "gateway_timeout_ms": 0}"#).is_err()
        );
        assert!(EngineConfig::from_json(r#"{"line_ordering": "sideways"}"#).is_err());
    }
}
