//! Engine configuration.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Tunables for an [`Engine`](crate::Engine).
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay of the batching drain task, in milliseconds.
    pub drain_delay_ms: u64,

    /// Delay before a deferred `x-focus` is applied, in milliseconds.
    pub focus_delay_ms: u64,

    /// Maximum number of queued items applied by one drain pass.
    ///
    /// Items left over are drained by a freshly scheduled pass, so a cyclic
    /// `x-run` cascade yields to the event loop instead of spinning forever.
    /// Must be at least 1.
    #[serde(deserialize_with = "at_least_one")]
    pub max_drain_items: usize,

    /// Tab range (`"first:last"`) used by `init` when no spec is passed and
    /// no previous range has been recorded.
    pub default_tab: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drain_delay_ms: 0,
            focus_delay_ms: 50,
            max_drain_items: 10_000,
            default_tab: None,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn at_least_one<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let n = usize::deserialize(deserializer)?;
    if n == 0 {
        return Err(de::Error::custom("max_drain_items must be at least 1"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.focus_delay_ms, 50);
        assert_eq!(config.drain_delay_ms, 0);
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = EngineConfig::from_json(
            r#"{"focus_delay_ms": 10, "default_tab": "first:last"}"#,
        )
        .unwrap();
        assert_eq!(config.focus_delay_ms, 10);
        assert_eq!(config.default_tab.as_deref(), Some("first:last"));
        assert_eq!(config.max_drain_items, 10_000);
    }

    #[test]
    fn zero_drain_limit_is_rejected() {
        let err = EngineConfig::from_json(r#"{"max_drain_items": 0}"#).unwrap_err();
        assert!(err.to_string().contains("max_drain_items must be at least 1"));

        let config = EngineConfig::from_json(r#"{"max_drain_items": 1}"#).unwrap();
        assert_eq!(config.max_drain_items, 1);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let err = EngineConfig::from_json(r#"{"focus_delay_ms": "soon"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid engine config"));
    }
}
