//! Reconciler settings
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ID_PREFIX: &str = "fw_id_";
pub const MAIN_CONTEXT: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Prefix of generated target ids.
    pub id_prefix: String,
    /// Context created up front and re-created by `clear_all_contexts`.
    pub main_context: String,
    /// Fail the cycle on an identity bound twice instead of letting the last binding win.
    pub strict_identities: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            main_context: MAIN_CONTEXT.to_string(),
            strict_identities: true,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ReconcilerError> {
        let config: ReconcilerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconcilerError> {
        if self.id_prefix.is_empty() {
            return Err(ReconcilerError::Config("id_prefix must not be empty".into()));
        }
        if self.main_context.is_empty() {
            return Err(ReconcilerError::Config("main_context must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ReconcilerConfig::from_json_str(r#"{"strict_identities": false}"#).unwrap();
        assert_eq!(config.id_prefix, "fw_id_");
        assert_eq!(config.main_context, "main");
        assert!(!config.strict_identities);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let err = ReconcilerConfig::from_json_str(r#"{"id_prefix": ""}"#).unwrap_err();
        assert!(matches!(err, ReconcilerError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let err = ReconcilerConfig::from_json_str("[1, 2").unwrap_err();
        assert!(matches!(err, ReconcilerError::SerdeError(_)));
    }
}
