//! Provider configuration.
//!
//! Configuration arrives from the orchestrator as a JSON object and is held
//! as a typed [`ProviderConfig`]. Every field has a default, so an empty
//! object (or null) is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Longest accepted creation deadline: one day.
pub const MAX_CREATE_TIMEOUT_SECS: u64 = 86_400;

fn default_create_timeout_secs() -> u64 {
    120
}

fn default_retry_min_backoff_ms() -> u64 {
    500
}

fn default_retry_max_backoff_ms() -> u64 {
    10_000
}

/// Settings that shape how the provider talks to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// How long link creation keeps retrying server errors.
    #[serde(default = "default_create_timeout_secs")]
    pub create_timeout_secs: u64,
    /// First delay between creation retries.
    #[serde(default = "default_retry_min_backoff_ms")]
    pub retry_min_backoff_ms: u64,
    /// Cap on the delay between creation retries.
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: default_create_timeout_secs(),
            retry_min_backoff_ms: default_retry_min_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

impl ProviderConfig {
    /// Parse configuration from the orchestrator's JSON.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|err| ProviderError::Configuration(err.to_string()))
    }

    /// Schema for the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "create_timeout_secs",
                Attribute::optional_int64()
                    .with_description("Seconds to keep retrying link creation on server errors")
                    .with_default(default_create_timeout_secs().into()),
            )
            .with_attribute(
                "retry_min_backoff_ms",
                Attribute::optional_int64()
                    .with_description("First delay between creation retries, in milliseconds")
                    .with_default(default_retry_min_backoff_ms().into()),
            )
            .with_attribute(
                "retry_max_backoff_ms",
                Attribute::optional_int64()
                    .with_description("Maximum delay between creation retries, in milliseconds")
                    .with_default(default_retry_max_backoff_ms().into()),
            )
    }

    /// Semantic checks beyond what the schema expresses.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if self.create_timeout_secs == 0 {
            diagnostics.push(
                Diagnostic::warning("Link creation will not be retried")
                    .with_detail("create_timeout_secs is 0")
                    .with_attribute("create_timeout_secs"),
            );
        }

        if self.create_timeout_secs > MAX_CREATE_TIMEOUT_SECS {
            diagnostics.push(
                Diagnostic::error("Link creation timeout is too long")
                    .with_detail(format!(
                        "create_timeout_secs ({}) exceeds {}",
                        self.create_timeout_secs, MAX_CREATE_TIMEOUT_SECS
                    ))
                    .with_attribute("create_timeout_secs"),
            );
        }

        if self.retry_min_backoff_ms == 0 {
            diagnostics.push(
                Diagnostic::error("Retry backoff must be positive")
                    .with_attribute("retry_min_backoff_ms"),
            );
        }

        if self.retry_max_backoff_ms < self.retry_min_backoff_ms {
            diagnostics.push(
                Diagnostic::error("Maximum retry backoff is below the minimum")
                    .with_detail(format!(
                        "retry_max_backoff_ms ({}) < retry_min_backoff_ms ({})",
                        self.retry_max_backoff_ms, self.retry_min_backoff_ms
                    ))
                    .with_attribute("retry_max_backoff_ms"),
            );
        }

        diagnostics
    }

    /// The retry policy for link creation.
    pub fn create_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(self.create_timeout_secs)).with_backoff(
            Duration::from_millis(self.retry_min_backoff_ms),
            Duration::from_millis(self.retry_max_backoff_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(json!({})).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(ProviderConfig::from_value(serde_json::Value::Null).unwrap(), config);

        let policy = config.create_retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(120));
        assert_eq!(policy.min_backoff, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let config = ProviderConfig::from_value(json!({
            "create_timeout_secs": 30,
            "retry_max_backoff_ms": 2000
        }))
        .unwrap();
        assert_eq!(config.create_timeout_secs, 30);
        assert_eq!(config.retry_min_backoff_ms, 500);
        assert_eq!(
            config.create_retry_policy().max_backoff,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_invalid_config() {
        let err = ProviderConfig::from_value(json!({"create_timeout_secs": "2m"})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::from_value(json!({"token": "secret"})).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_validate() {
        assert!(ProviderConfig::default().validate().is_empty());

        let config = ProviderConfig {
            create_timeout_secs: 0,
            retry_min_backoff_ms: 1000,
            retry_max_backoff_ms: 100,
        };
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 2);
        assert!(!diagnostics[0].is_error());
        assert!(diagnostics[1].is_error());
        assert_eq!(
            diagnostics[1].attribute,
            Some("retry_max_backoff_ms".to_string())
        );
    }

    #[test]
    fn test_validate_timeout_upper_bound() {
        let at_limit = ProviderConfig {
            create_timeout_secs: MAX_CREATE_TIMEOUT_SECS,
            ..ProviderConfig::default()
        };
        assert!(at_limit.validate().is_empty());

        let config = ProviderConfig::from_value(json!({"create_timeout_secs": i64::MAX})).unwrap();
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(
            diagnostics[0].attribute,
            Some("create_timeout_secs".to_string())
        );
    }
}
