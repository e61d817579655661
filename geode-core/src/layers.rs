//! Depth-stratified base weights.
//!
//! A [`LayerTable`] is an ordered list of half-open `[z_min, z_max)` ranges that
//! partition the z axis from the first layer's floor upwards. The last layer is
//! unbounded above. Depths below the floor match no layer; the engine resolves those
//! cells to void.

use geode_utils::Category;
use thiserror::Error;

use crate::weights::WeightMap;

/// An error found while validating a layer table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerTableError {
    /// The table has no layers.
    #[error("Layer table is empty")]
    Empty,
    /// A layer has no categories.
    #[error("Layer {index} has no categories")]
    NoCategories {
        /// Position of the layer in the table.
        index: usize,
    },
    /// A layer's range is empty or inverted.
    #[error("Layer {index} has an empty range [{z_min}, {z_max})")]
    EmptyRange {
        /// Position of the layer in the table.
        index: usize,
        /// Lower bound of the layer.
        z_min: i64,
        /// Upper bound of the layer.
        z_max: i64,
    },
    /// Two consecutive layers leave a gap or overlap.
    #[error("Layer {index} starts at {z_min} but the previous layer ends at {previous_end}")]
    NotContiguous {
        /// Position of the layer in the table.
        index: usize,
        /// Lower bound of the layer.
        z_min: i64,
        /// Upper bound of the previous layer.
        previous_end: i64,
    },
    /// A layer other than the last one is unbounded above.
    #[error("Only the last layer may be unbounded, but layer {index} is")]
    UnboundedBeforeEnd {
        /// Position of the layer in the table.
        index: usize,
    },
    /// The last layer has an upper bound.
    #[error("The last layer must be unbounded above")]
    BoundedTop,
    /// A weight is negative, NaN or infinite.
    #[error("Layer {index} has invalid weight {weight} for {category}")]
    InvalidWeight {
        /// Position of the layer in the table.
        index: usize,
        /// Category carrying the weight.
        category: Category,
        /// The offending weight.
        weight: f64,
    },
}

/// A depth range with its base category weights.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLayer {
    /// Inclusive lower bound.
    pub z_min: i64,
    /// Exclusive upper bound, `None` for the unbounded top layer.
    pub z_max: Option<i64>,
    /// Base weights for cells in this range.
    pub weights: WeightMap,
}

impl DepthLayer {
    /// Create a layer covering `[z_min, z_max)`.
    #[must_use]
    pub const fn new(z_min: i64, z_max: Option<i64>, weights: WeightMap) -> Self {
        Self {
            z_min,
            z_max,
            weights,
        }
    }

    /// Whether `z` lies in this layer's range.
    #[must_use]
    pub fn contains(&self, z: i64) -> bool {
        z >= self.z_min && self.z_max.is_none_or(|z_max| z < z_max)
    }
}

/// Validated, immutable list of depth layers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTable {
    layers: Vec<DepthLayer>,
}

impl LayerTable {
    /// Validate and build a table from layers ordered by depth.
    pub fn new(layers: Vec<DepthLayer>) -> Result<Self, LayerTableError> {
        if layers.is_empty() {
            return Err(LayerTableError::Empty);
        }

        let last = layers.len() - 1;
        let mut previous_end: Option<i64> = None;
        for (index, layer) in layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(LayerTableError::NoCategories { index });
            }
            if let Some((category, weight)) = layer
                .weights
                .iter()
                .find(|(_, w)| !w.is_finite() || *w < 0.0)
            {
                return Err(LayerTableError::InvalidWeight {
                    index,
                    category,
                    weight,
                });
            }
            match previous_end {
                Some(previous_end) if previous_end != layer.z_min => {
                    return Err(LayerTableError::NotContiguous {
                        index,
                        z_min: layer.z_min,
                        previous_end,
                    });
                }
                _ => {}
            }
            match layer.z_max {
                Some(z_max) if z_max <= layer.z_min => {
                    return Err(LayerTableError::EmptyRange {
                        index,
                        z_min: layer.z_min,
                        z_max,
                    });
                }
                Some(_) if index == last => return Err(LayerTableError::BoundedTop),
                None if index != last => {
                    return Err(LayerTableError::UnboundedBeforeEnd { index });
                }
                _ => {}
            }
            previous_end = layer.z_max;
        }

        Ok(Self { layers })
    }

    /// The layer containing `z`, or `None` below the table floor.
    #[must_use]
    pub fn layer_for(&self, z: i64) -> Option<&DepthLayer> {
        self.layers.iter().find(|layer| layer.contains(z))
    }

    /// The lowest depth covered by the table.
    #[must_use]
    pub fn floor(&self) -> i64 {
        self.layers.first().map_or(0, |layer| layer.z_min)
    }

    /// All layers, ordered by depth.
    #[must_use]
    pub fn layers(&self) -> &[DepthLayer] {
        &self.layers
    }
}

impl Default for LayerTable {
    /// The built-in table: a porous surface band, upper and lower crust, and an
    /// unbounded deep zone.
    fn default() -> Self {
        use Category::{
            Basalt, Copper, Diamond, Emerald, Feldspar, Gold, Granite, Iron, Mica, Quartz, Void,
        };

        Self {
            layers: vec![
                DepthLayer::new(
                    0,
                    Some(10),
                    WeightMap::from([
                        (Void, 0.5),
                        (Quartz, 0.3),
                        (Feldspar, 0.1),
                        (Mica, 0.05),
                        (Gold, 0.05),
                    ]),
                ),
                DepthLayer::new(
                    10,
                    Some(50),
                    WeightMap::from([
                        (Void, 0.2),
                        (Quartz, 0.25),
                        (Feldspar, 0.2),
                        (Granite, 0.15),
                        (Mica, 0.1),
                        (Copper, 0.05),
                        (Iron, 0.04),
                        (Gold, 0.01),
                    ]),
                ),
                DepthLayer::new(
                    50,
                    Some(200),
                    WeightMap::from([
                        (Basalt, 0.35),
                        (Granite, 0.25),
                        (Iron, 0.15),
                        (Copper, 0.1),
                        (Void, 0.05),
                        (Gold, 0.05),
                        (Quartz, 0.05),
                    ]),
                ),
                DepthLayer::new(
                    200,
                    None,
                    WeightMap::from([
                        (Basalt, 0.5),
                        (Iron, 0.2),
                        (Gold, 0.1),
                        (Diamond, 0.1),
                        (Emerald, 0.08),
                        (Void, 0.02),
                    ]),
                ),
            ],
        }
    }
}
