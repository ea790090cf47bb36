//! Engine configuration, built once from the environment at process start
//! and threaded through actor construction.

use std::collections::HashMap;

use serde_json::Value;

use crate::utils;

/// Default per-actor deadline when `DEFAULT_TIMEOUT` is unset.
pub const DEFAULT_TIMEOUT_SECS: f64 = 3600.0;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-actor execution deadline in seconds. `0` disables the deadline.
    pub default_timeout: f64,
    /// Skip the rehearsal pass entirely (`SKIP_DRY`).
    pub skip_dry: bool,
    /// Ambient token set for `%NAME%` substitution. Normally the process
    /// environment, optionally extended by caller-supplied overrides.
    pub tokens: HashMap<String, String>,
}

impl EngineConfig {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        let tokens: HashMap<String, String> = std::env::vars().collect();
        let default_timeout = tokens
            .get("DEFAULT_TIMEOUT")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let skip_dry = tokens
            .get("SKIP_DRY")
            .map(|v| utils::str2bool(&Value::String(v.clone())))
            .unwrap_or(false);
        EngineConfig {
            default_timeout,
            skip_dry,
            tokens,
        }
    }

    /// Add or override one ambient token.
    pub fn with_token(mut self, key: &str, value: &str) -> Self {
        self.tokens.insert(key.to_string(), value.to_string());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_timeout: DEFAULT_TIMEOUT_SECS,
            skip_dry: false,
            tokens: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT_SECS);
        assert!(!config.skip_dry);
        assert!(config.tokens.is_empty());
    }

    #[test]
    fn test_with_token() {
        let config = EngineConfig::default().with_token("RELEASE", "v9");
        assert_eq!(config.tokens.get("RELEASE").map(String::as_str), Some("v9"));
    }
}
