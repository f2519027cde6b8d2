//! Strategy identities and their parameter maps.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ConfigError;

// ── Strategy kind ───────────────────────────────────────────────────────────

/// The closed set of segmentation algorithms. The serialized names are the
/// ones that appear in artifact filenames and `strategy_config.strategy_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "fixed_size")]
    FixedSize,
    #[serde(rename = "sliding_langchain")]
    Hierarchical,
    #[serde(rename = "sliding_unstructured")]
    ElementBased,
    #[serde(rename = "semantic")]
    Semantic,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::FixedSize,
        StrategyKind::Hierarchical,
        StrategyKind::ElementBased,
        StrategyKind::Semantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::FixedSize => "fixed_size",
            StrategyKind::Hierarchical => "sliding_langchain",
            StrategyKind::ElementBased => "sliding_unstructured",
            StrategyKind::Semantic => "semantic",
        }
    }

    /// Parameters used when a config file does not override them.
    pub fn default_parameters(&self) -> Map<String, Value> {
        let value = match self {
            StrategyKind::FixedSize => json!({
                "chunk_size": 512,
                "chunk_overlap": 0,
                "encoding_name": "cl100k_base",
            }),
            StrategyKind::Hierarchical => json!({
                "chunk_size": 1000,
                "chunk_overlap": 200,
                "separators": ["\n\n", "\n", ". ", " ", ""],
                "keep_separator": "end",
            }),
            StrategyKind::ElementBased => json!({
                "max_elements_per_chunk": 10,
                "overlap_percentage": 0.2,
                "priority_element_types": ["Title", "Header", "NarrativeText"],
            }),
            StrategyKind::Semantic => json!({
                "embedding_model": "all-minilm",
                "similarity_threshold": 0.8,
                "min_chunk_size": 200,
                "max_chunk_size": 2000,
                "batch_size": 32,
                "breakpoint_mode": "threshold",
                "breakpoint_percentile": 0.95,
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

// ── Strategy config ─────────────────────────────────────────────────────────

/// A strategy name plus its parameter map, exactly as persisted in artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl StrategyConfig {
    /// Config carrying the default parameters for `kind`.
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            strategy_name: kind.as_str().to_string(),
            parameters: kind.default_parameters(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> Result<StrategyKind, ConfigError> {
        self.strategy_name.parse()
    }

    /// Deserialize the whole parameter map into a typed parameter struct.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.parameters.clone())).map_err(|e| {
            ConfigError::InvalidParameter {
                strategy: self.strategy_name.clone(),
                parameter: "parameters".to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Integer parameter lookup, trying each key in order.
    pub fn u64_param(&self, keys: &[&str]) -> Option<u64> {
        keys.iter()
            .find_map(|k| self.parameters.get(*k).and_then(Value::as_u64))
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "recursive".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStrategy(name) if name == "recursive"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&StrategyKind::ElementBased).unwrap();
        assert_eq!(json, "\"sliding_unstructured\"");
    }

    #[test]
    fn u64_param_falls_back_to_alternate_key() {
        let cfg = StrategyConfig {
            strategy_name: "sliding_langchain".into(),
            parameters: Map::new(),
        }
        .with_param("overlap", 80);
        assert_eq!(cfg.u64_param(&["chunk_overlap", "overlap"]), Some(80));
        assert_eq!(cfg.u64_param(&["chunk_size"]), None);
    }

    #[test]
    fn defaults_carry_expected_sizes() {
        let fixed = StrategyConfig::new(StrategyKind::FixedSize);
        assert_eq!(fixed.u64_param(&["chunk_size"]), Some(512));
        assert_eq!(fixed.str_param("encoding_name"), Some("cl100k_base"));
    }
}
