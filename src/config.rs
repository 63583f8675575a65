//! Engine configuration.
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the session and the formula sandbox. Every key is optional in
/// the JSON form; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Name of the blob-store slot that holds the saved forms.
    pub storage_key: String,
    /// Longest formula accepted, in characters.
    pub max_formula_len: usize,
    /// Deepest expression nesting the interpreter will walk.
    pub max_expr_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: "forms".to_string(),
            max_formula_len: 4096,
            max_expr_depth: 128,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storageKey must not be empty".into()));
        }
        if self.max_formula_len == 0 || self.max_expr_depth == 0 {
            return Err(ConfigError::Invalid("limits must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "storageKey": "drafts" }"#).unwrap();
        assert_eq!(config.storage_key, "drafts");
        assert_eq!(config.max_formula_len, EngineConfig::default().max_formula_len);
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_limits() {
        assert!(matches!(EngineConfig::from_json_str(r#"{ "storage": "x" }"#), Err(ConfigError::Malformed(_))));
        assert!(matches!(EngineConfig::from_json_str(r#"{ "maxExprDepth": 0 }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(EngineConfig::from_json_str(r#"{ "storageKey": " " }"#), Err(ConfigError::Invalid(_))));
    }
}
