//! The single entry point used by transport layers.
//!
//! A [`GenerateRequest`] names one of the four generation shapes. Missing fields take
//! the same defaults the public service has always used.

use std::sync::atomic::{AtomicBool, Ordering};

use geode_utils::Category;
use serde::{Deserialize, Serialize};

use crate::config::Limits;
use crate::engine::MineralEngine;
use crate::generator::{Grid2, Grid3, NEVER_STOP, ZoomedSlice};
use crate::weights::ProbabilityOffsets;

/// Seed used when a request does not carry one.
pub const DEFAULT_SEED: &str = "default_seed";
/// Default edge length of a 3D chunk.
pub const DEFAULT_CHUNK_SIZE: i64 = 32;
/// Default edge length of a 2D slice.
pub const DEFAULT_SLICE_SIZE: i64 = 100;

fn default_seed() -> String {
    DEFAULT_SEED.to_owned()
}

const fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE
}

const fn default_slice_size() -> i64 {
    DEFAULT_SLICE_SIZE
}

const fn default_zoom() -> i64 {
    1
}

/// Bring a wire size into range: zero or less is empty, anything past `u32` saturates.
fn wire_size(size: i64) -> u32 {
    u32::try_from(size.max(0)).unwrap_or(u32::MAX)
}

/// A generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GenerateRequest {
    /// A single cell.
    Cell {
        /// World seed.
        #[serde(default = "default_seed")]
        seed: String,
        /// X coordinate.
        #[serde(default)]
        x: i64,
        /// Y coordinate.
        #[serde(default)]
        y: i64,
        /// Z coordinate (depth).
        #[serde(default)]
        z: i64,
        /// Probability offsets.
        #[serde(default)]
        offsets: ProbabilityOffsets,
    },
    /// A raw plane of categories at depth `z`.
    Slice2d {
        /// World seed.
        #[serde(default = "default_seed")]
        seed: String,
        /// Cells per axis.
        #[serde(default = "default_slice_size")]
        size: i64,
        /// Depth of the plane.
        #[serde(default)]
        z: i64,
        /// World x of local column zero.
        #[serde(default)]
        x_offset: i64,
        /// World y of local row zero.
        #[serde(default)]
        y_offset: i64,
        /// Probability offsets.
        #[serde(default)]
        offsets: ProbabilityOffsets,
    },
    /// A zoomed cross-section of the volume at depth `z`, for display.
    Slice3d {
        /// World seed.
        #[serde(default = "default_seed")]
        seed: String,
        /// Output cells per axis.
        #[serde(default = "default_slice_size")]
        size: i64,
        /// Depth of the cross-section.
        #[serde(default)]
        z: i64,
        /// World x of local column zero.
        #[serde(default)]
        x_offset: i64,
        /// World y of local row zero.
        #[serde(default)]
        y_offset: i64,
        /// Probability offsets.
        #[serde(default)]
        offsets: ProbabilityOffsets,
        /// Block size of each resolved cell.
        #[serde(default = "default_zoom")]
        zoom: i64,
    },
    /// A cube of categories.
    Chunk3d {
        /// World seed.
        #[serde(default = "default_seed")]
        seed: String,
        /// Cells per axis.
        #[serde(default = "default_chunk_size")]
        size: i64,
        /// World x of local index zero.
        #[serde(default)]
        x_offset: i64,
        /// World y of local index zero.
        #[serde(default)]
        y_offset: i64,
        /// World z of local index zero.
        #[serde(default)]
        z_offset: i64,
        /// Probability offsets.
        #[serde(default)]
        offsets: ProbabilityOffsets,
    },
}

/// The result of a [`GenerateRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    /// Result of [`GenerateRequest::Cell`].
    Cell {
        /// The resolved category.
        mineral: Category,
    },
    /// Result of [`GenerateRequest::Slice2d`].
    Slice(Grid2<Category>),
    /// Result of [`GenerateRequest::Slice3d`].
    Zoomed(ZoomedSlice),
    /// Result of [`GenerateRequest::Chunk3d`].
    Chunk(Grid3<Category>),
}

impl MineralEngine {
    /// Serve a request.
    ///
    /// Sizes above the configured limits are clamped rather than rejected.
    #[must_use]
    pub fn generate(&self, request: &GenerateRequest, limits: &Limits) -> GenerateResponse {
        self.dispatch(request, limits, &NEVER_STOP)
    }

    /// Serve a request that may be abandoned.
    ///
    /// Batch generation checks `stop` before each x column and issues no further
    /// resolver calls once it is set. Returns `None` if `stop` was set before the
    /// response was complete.
    #[must_use]
    pub fn generate_until(
        &self,
        request: &GenerateRequest,
        limits: &Limits,
        stop: &AtomicBool,
    ) -> Option<GenerateResponse> {
        let response = self.dispatch(request, limits, stop);
        (!stop.load(Ordering::Relaxed)).then_some(response)
    }

    fn dispatch(
        &self,
        request: &GenerateRequest,
        limits: &Limits,
        stop: &AtomicBool,
    ) -> GenerateResponse {
        match request {
            GenerateRequest::Cell {
                seed,
                x,
                y,
                z,
                offsets,
            } => GenerateResponse::Cell {
                mineral: self.resolve(seed.as_bytes(), *x, *y, *z, offsets),
            },
            GenerateRequest::Slice2d {
                seed,
                size,
                z,
                x_offset,
                y_offset,
                offsets,
            } => GenerateResponse::Slice(self.slice_2d_until(
                seed.as_bytes(),
                limits.clamp_slice(wire_size(*size)),
                *z,
                *x_offset,
                *y_offset,
                offsets,
                stop,
            )),
            GenerateRequest::Slice3d {
                seed,
                size,
                z,
                x_offset,
                y_offset,
                offsets,
                zoom,
            } => GenerateResponse::Zoomed(self.slice_until(
                seed.as_bytes(),
                limits.clamp_slice(wire_size(*size)),
                *z,
                *x_offset,
                *y_offset,
                offsets,
                wire_size(*zoom),
                stop,
            )),
            GenerateRequest::Chunk3d {
                seed,
                size,
                x_offset,
                y_offset,
                z_offset,
                offsets,
            } => GenerateResponse::Chunk(self.chunk_3d_until(
                seed.as_bytes(),
                limits.clamp_chunk(wire_size(*size)),
                *x_offset,
                *y_offset,
                *z_offset,
                offsets,
                stop,
            )),
        }
    }
}
