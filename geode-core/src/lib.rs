//! # Geode Core
//!
//! The deterministic mineral sampling engine. Every cell of the unbounded volume is a
//! pure function of `(seed, x, y, z, layer table, probability offsets)`:
//!
//! 1. [`geode_utils::coordinate_hash`] maps the coordinate to a uniform value
//! 2. [`LayerTable`] selects the base weights for the cell's depth
//! 3. [`apply_offsets`] perturbs and renormalizes those weights
//! 4. [`sample`] walks the cumulative distribution in category order
//!
//! [`MineralEngine`] composes the steps and the [`generator`] module batches them over
//! slices and chunks.

pub mod config;
pub mod engine;
pub mod generator;
pub mod layers;
pub mod request;
pub mod sampler;
pub mod weights;

pub use config::{EngineConfig, LayerConfig, Limits};
pub use engine::MineralEngine;
pub use generator::{Grid2, Grid3, ZoomedSlice};
pub use layers::{DepthLayer, LayerTable, LayerTableError};
pub use request::{GenerateRequest, GenerateResponse};
pub use sampler::sample;
pub use weights::{Distribution, NegativeWeightPolicy, ProbabilityOffsets, WeightMap, apply_offsets};

pub use geode_utils::Category;
