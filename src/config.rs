//! Interpreter configuration

use serde::Deserialize;

use crate::error::ScriptError;

/// Tunables for an [`Interpreter`](crate::Interpreter).
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration:
///
/// ```
/// use sandrun::InterpreterConfig;
///
/// let config = InterpreterConfig::from_json(r#"{ "checkpoint_interval": 50 }"#).unwrap();
/// assert_eq!(config.checkpoint_interval, 50);
/// assert_eq!(config.max_call_depth, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Operations between cooperative yields to the host scheduler (0 disables yielding)
    pub checkpoint_interval: u64,
    /// Maximum nesting of script function calls
    pub max_call_depth: usize,
    /// Bindings per context rendered into error diagnostics
    pub snapshot_limit: usize,
    /// Maximum "did you mean" candidates on unknown names
    pub max_suggestions: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            max_call_depth: 256,
            snapshot_limit: 10,
            max_suggestions: 3,
        }
    }
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(json)
            .map_err(|e| ScriptError::runtime(format!("Invalid interpreter configuration: {}", e)))
    }

    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = InterpreterConfig::from_json("{}").unwrap();
        assert_eq!(config, InterpreterConfig::default());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(InterpreterConfig::from_json(r#"{ "max_call_depth": "deep" }"#).is_err());
    }
}
