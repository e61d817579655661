//! The per-cell resolver.

use geode_utils::{Category, coordinate_hash};

use crate::layers::LayerTable;
use crate::sampler::sample;
use crate::weights::{Distribution, NegativeWeightPolicy, ProbabilityOffsets, apply_offsets};

/// Resolves mineral categories for cells of the volume.
///
/// Owns its layer table, so independent engines can describe different worlds. The
/// engine holds no mutable state and is shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct MineralEngine {
    layers: LayerTable,
    policy: NegativeWeightPolicy,
}

impl MineralEngine {
    /// Create an engine from a validated layer table.
    #[must_use]
    pub const fn new(layers: LayerTable, policy: NegativeWeightPolicy) -> Self {
        Self { layers, policy }
    }

    /// The layer table used by this engine.
    #[must_use]
    pub const fn layers(&self) -> &LayerTable {
        &self.layers
    }

    /// How negative adjusted weights are treated.
    #[must_use]
    pub const fn policy(&self) -> NegativeWeightPolicy {
        self.policy
    }

    /// The adjusted distribution for cells at depth `z`.
    ///
    /// Depths below the table floor have no layer and yield a void-only distribution.
    #[must_use]
    pub fn distribution(&self, z: i64, offsets: &ProbabilityOffsets) -> Distribution {
        match self.layers.layer_for(z) {
            Some(layer) => apply_offsets(&layer.weights, offsets, self.policy),
            None => Distribution::void_only(),
        }
    }

    /// Resolve the category of a single cell.
    ///
    /// Recomputes the hash and the distribution on every call.
    #[must_use]
    pub fn resolve(
        &self,
        seed: &[u8],
        x: i64,
        y: i64,
        z: i64,
        offsets: &ProbabilityOffsets,
    ) -> Category {
        sample(
            coordinate_hash(seed, x, y, z),
            &self.distribution(z, offsets),
        )
    }

    /// Resolve a cell against a distribution computed beforehand for its depth.
    #[inline]
    #[must_use]
    pub(crate) fn resolve_with(
        seed: &[u8],
        x: i64,
        y: i64,
        z: i64,
        distribution: &Distribution,
    ) -> Category {
        sample(coordinate_hash(seed, x, y, z), distribution)
    }
}
