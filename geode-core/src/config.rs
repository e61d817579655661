//! Engine configuration.
//!
//! Parsed from the `engine` section of the server config file. Everything has a
//! default, so an empty section builds the built-in world.

use serde::{Deserialize, Serialize};

use crate::engine::MineralEngine;
use crate::layers::{DepthLayer, LayerTable, LayerTableError};
use crate::weights::{NegativeWeightPolicy, WeightMap};

/// Largest chunk edge served by default.
pub const MAX_CHUNK_SIZE: u32 = 128;
/// Largest slice edge served by default.
pub const MAX_SLICE_SIZE: u32 = 1024;

const fn default_max_chunk_size() -> u32 {
    MAX_CHUNK_SIZE
}

const fn default_max_slice_size() -> u32 {
    MAX_SLICE_SIZE
}

/// Per-request size caps. These bound memory and CPU per request only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Largest chunk edge; larger requests are clamped.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u32,
    /// Largest slice edge; larger requests are clamped.
    #[serde(default = "default_max_slice_size")]
    pub max_slice_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            max_slice_size: MAX_SLICE_SIZE,
        }
    }
}

impl Limits {
    /// Clamp a requested chunk edge.
    #[must_use]
    pub fn clamp_chunk(&self, size: u32) -> u32 {
        if size > self.max_chunk_size {
            log::debug!("Clamping chunk size {size} to {}", self.max_chunk_size);
        }
        size.min(self.max_chunk_size)
    }

    /// Clamp a requested slice edge.
    #[must_use]
    pub fn clamp_slice(&self, size: u32) -> u32 {
        if size > self.max_slice_size {
            log::debug!("Clamping slice size {size} to {}", self.max_slice_size);
        }
        size.min(self.max_slice_size)
    }
}

/// One depth layer as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Inclusive lower bound.
    pub z_min: i64,
    /// Exclusive upper bound; omit for the top layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_max: Option<i64>,
    /// Base weights by category name.
    pub weights: WeightMap,
}

impl From<&DepthLayer> for LayerConfig {
    fn from(layer: &DepthLayer) -> Self {
        Self {
            z_min: layer.z_min,
            z_max: layer.z_max,
            weights: layer.weights.clone(),
        }
    }
}

/// Configuration of a [`MineralEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Treatment of weights pushed below zero by offsets.
    #[serde(default)]
    pub negative_weights: NegativeWeightPolicy,
    /// Custom layer table; the built-in table is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<LayerConfig>>,
    /// Request size caps.
    #[serde(default)]
    pub limits: Limits,
}

impl EngineConfig {
    /// Validate the layer list and build an engine.
    pub fn build_engine(&self) -> Result<MineralEngine, LayerTableError> {
        let table = match &self.layers {
            Some(layers) => LayerTable::new(
                layers
                    .iter()
                    .map(|l| DepthLayer::new(l.z_min, l.z_max, l.weights.clone()))
                    .collect(),
            )?,
            None => LayerTable::default(),
        };
        log::debug!(
            "Built mineral engine with {} layers (negative weights: {:?})",
            table.layers().len(),
            self.negative_weights
        );
        Ok(MineralEngine::new(table, self.negative_weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geode_utils::Category;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: EngineConfig = serde_json5::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.layers(), &LayerTable::default());
        assert_eq!(engine.policy(), NegativeWeightPolicy::Preserve);
    }

    #[test]
    fn test_custom_layers() {
        let config: EngineConfig = serde_json5::from_str(
            r#"{
                negative_weights: "clamp",
                layers: [
                    { z_min: -10, z_max: 0, weights: { void: 1 } },
                    { z_min: 0, weights: { gold: 2, iron: 1 } },
                ],
                limits: { max_chunk_size: 16 },
            }"#,
        )
        .unwrap();
        assert_eq!(config.limits.max_chunk_size, 16);
        assert_eq!(config.limits.max_slice_size, MAX_SLICE_SIZE);

        let engine = config.build_engine().unwrap();
        assert_eq!(engine.policy(), NegativeWeightPolicy::Clamp);
        assert_eq!(engine.layers().floor(), -10);
        let deep = engine.layers().layer_for(1_000).unwrap();
        assert_eq!(deep.weights.get(Category::Gold), Some(2.0));
    }

    #[test]
    fn test_invalid_layers_are_reported() {
        let config: EngineConfig = serde_json5::from_str(
            r#"{ layers: [ { z_min: 0, z_max: 5, weights: { void: 1 } } ] }"#,
        )
        .unwrap();
        assert_eq!(
            config.build_engine().unwrap_err(),
            LayerTableError::BoundedTop
        );
    }

    #[test]
    fn test_unknown_category_in_layers_is_rejected() {
        let result = serde_json5::from_str::<EngineConfig>(
            r#"{ layers: [ { z_min: 0, weights: { adamantium: 1 } } ] }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_limits_clamp() {
        let limits = Limits::default();
        assert_eq!(limits.clamp_chunk(32), 32);
        assert_eq!(limits.clamp_chunk(500), MAX_CHUNK_SIZE);
        assert_eq!(limits.clamp_slice(5_000), MAX_SLICE_SIZE);
    }
}
