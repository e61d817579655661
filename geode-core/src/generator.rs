//! Batch generation of slices and chunks.
//!
//! Every cell is independent of every other, so the work is split across the rayon
//! pool one x column at a time. The output is identical to evaluating
//! [`MineralEngine::resolve`] cell by cell in any order.

use std::sync::atomic::{AtomicBool, Ordering};

use geode_utils::{BACKGROUND_COLOR, Category};
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::engine::MineralEngine;
use crate::weights::{Distribution, ProbabilityOffsets};

/// A square grid addressed as `[x][y]`.
///
/// Serializes as nested arrays, outer index x.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid2<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T> Grid2<T> {
    fn from_cells(size: usize, cells: Vec<T>) -> Self {
        debug_assert_eq!(cells.len(), size * size);
        Self { size, cells }
    }

    /// Cells per axis.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.size && y < self.size {
            self.cells.get(x * self.size + y)
        } else {
            None
        }
    }

    /// All cells in x-major order.
    #[must_use]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// The column of cells at `x`, indexed by y. Panics if `x` is out of range.
    pub(crate) fn column(&self, x: usize) -> &[T] {
        &self.cells[x * self.size..(x + 1) * self.size]
    }
}

impl<T: Serialize> Serialize for Grid2<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.size))?;
        for x in 0..self.size {
            seq.serialize_element(self.column(x))?;
        }
        seq.end()
    }
}

/// A cube addressed as `[x][y][z]`.
///
/// Serializes as nested arrays, outer index x, innermost z.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid3<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T> Grid3<T> {
    /// Cells per axis.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether the cube has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at `(x, y, z)`, or `None` outside the cube.
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        if x < self.size && y < self.size && z < self.size {
            self.cells.get((x * self.size + y) * self.size + z)
        } else {
            None
        }
    }

    /// All cells in x, y, z order.
    #[must_use]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

impl<T: Serialize> Serialize for Grid3<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let plane = self.size * self.size;
        let mut seq = serializer.serialize_seq(Some(self.size))?;
        for x in 0..self.size {
            let rows: Vec<&[T]> = self.cells[x * plane..(x + 1) * plane]
                .chunks(self.size)
                .collect();
            seq.serialize_element(&rows)?;
        }
        seq.end()
    }
}

/// A zoomed cross-section for display.
///
/// Each resolved cell covers a `zoom x zoom` block. Cells in the trailing band that
/// integer division left uncovered are `None` and render as the background color.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ZoomedSlice {
    /// Block size in output cells.
    pub zoom: u32,
    /// Resolved cells per axis before replication.
    pub effective_size: usize,
    /// Output cells, `[x][y]`.
    pub cells: Grid2<Option<Category>>,
}

impl ZoomedSlice {
    /// Output cells per axis.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.cells.size()
    }

    /// Render to RGB pixels in image order: rows by y, then columns by x.
    #[must_use]
    pub fn to_rgb(&self) -> Vec<[u8; 3]> {
        let size = self.size();
        let mut pixels = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let color = self
                    .cells
                    .get(x, y)
                    .copied()
                    .flatten()
                    .map_or(BACKGROUND_COLOR, Category::color);
                pixels.push(color);
            }
        }
        pixels
    }
}

impl MineralEngine {
    /// Resolve a `size x size` plane at depth `z`, one resolver call per cell.
    ///
    /// Cell `[lx][ly]` is the world coordinate `(x_offset + lx, y_offset + ly, z)`.
    #[must_use]
    pub fn slice_2d(
        &self,
        seed: &[u8],
        size: u32,
        z: i64,
        x_offset: i64,
        y_offset: i64,
        offsets: &ProbabilityOffsets,
    ) -> Grid2<Category> {
        self.slice_2d_until(seed, size, z, x_offset, y_offset, offsets, &NEVER_STOP)
    }

    /// Resolve a zoomed `size x size` plane at depth `z`.
    ///
    /// Only `(size / zoom)^2` cells are resolved. Each is replicated into a
    /// `zoom x zoom` block, and the band left over when `zoom` does not divide `size`
    /// is background. A zoom of zero yields a background-only slice.
    #[must_use]
    #[expect(clippy::too_many_arguments, reason = "mirrors the request shape")]
    pub fn slice(
        &self,
        seed: &[u8],
        size: u32,
        z: i64,
        x_offset: i64,
        y_offset: i64,
        offsets: &ProbabilityOffsets,
        zoom: u32,
    ) -> ZoomedSlice {
        self.slice_until(seed, size, z, x_offset, y_offset, offsets, zoom, &NEVER_STOP)
    }

    /// Resolve a `size^3` cube, one resolver call per cell.
    ///
    /// Cell `[lx][ly][lz]` is the world coordinate
    /// `(x_offset + lx, y_offset + ly, z_offset + lz)`. A size whose cell count does
    /// not fit in memory addressing yields an empty cube.
    #[must_use]
    pub fn chunk_3d(
        &self,
        seed: &[u8],
        size: u32,
        x_offset: i64,
        y_offset: i64,
        z_offset: i64,
        offsets: &ProbabilityOffsets,
    ) -> Grid3<Category> {
        self.chunk_3d_until(seed, size, x_offset, y_offset, z_offset, offsets, &NEVER_STOP)
    }

    #[tracing::instrument(level = "debug", skip(self, seed, offsets, stop))]
    #[expect(clippy::too_many_arguments, reason = "mirrors the request shape")]
    pub(crate) fn slice_2d_until(
        &self,
        seed: &[u8],
        size: u32,
        z: i64,
        x_offset: i64,
        y_offset: i64,
        offsets: &ProbabilityOffsets,
        stop: &AtomicBool,
    ) -> Grid2<Category> {
        let size = size as usize;
        let Some(total) = size.checked_mul(size) else {
            log::warn!("Slice size {size} is too large, returning an empty slice");
            return Grid2::from_cells(0, Vec::new());
        };
        let distribution = self.distribution(z, offsets);
        let mut cells = vec![Category::Void; total];
        if size > 0 {
            fill_plane(
                &mut cells,
                size,
                seed,
                (x_offset, y_offset, z),
                &distribution,
                stop,
            );
        }
        Grid2::from_cells(size, cells)
    }

    #[tracing::instrument(level = "debug", skip(self, seed, offsets, stop))]
    #[expect(clippy::too_many_arguments, reason = "mirrors the request shape")]
    pub(crate) fn slice_until(
        &self,
        seed: &[u8],
        size: u32,
        z: i64,
        x_offset: i64,
        y_offset: i64,
        offsets: &ProbabilityOffsets,
        zoom: u32,
        stop: &AtomicBool,
    ) -> ZoomedSlice {
        let effective = size.checked_div(zoom).unwrap_or(0);
        let resolved = self.slice_2d_until(seed, effective, z, x_offset, y_offset, offsets, stop);

        let size = size as usize;
        let zoom_usize = zoom as usize;
        let covered = resolved.size() * zoom_usize;
        let Some(total) = size.checked_mul(size) else {
            log::warn!("Slice size {size} is too large, returning an empty slice");
            return ZoomedSlice {
                zoom,
                effective_size: 0,
                cells: Grid2::from_cells(0, Vec::new()),
            };
        };
        let mut cells = vec![None; total];
        if covered > 0 && !stop.load(Ordering::Relaxed) {
            cells
                .par_chunks_mut(size)
                .take(covered)
                .enumerate()
                .for_each(|(x, column)| {
                    let source = resolved.column(x / zoom_usize);
                    for (y, cell) in column.iter_mut().take(covered).enumerate() {
                        *cell = Some(source[y / zoom_usize]);
                    }
                });
        }

        ZoomedSlice {
            zoom,
            effective_size: resolved.size(),
            cells: Grid2::from_cells(size, cells),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, seed, offsets, stop))]
    #[expect(clippy::too_many_arguments, reason = "mirrors the request shape")]
    pub(crate) fn chunk_3d_until(
        &self,
        seed: &[u8],
        size: u32,
        x_offset: i64,
        y_offset: i64,
        z_offset: i64,
        offsets: &ProbabilityOffsets,
        stop: &AtomicBool,
    ) -> Grid3<Category> {
        let size = size as usize;
        let Some((plane, total)) = size
            .checked_mul(size)
            .and_then(|plane| Some((plane, plane.checked_mul(size)?)))
        else {
            log::warn!("Chunk size {size} is too large, returning an empty chunk");
            return Grid3 {
                size: 0,
                cells: Vec::new(),
            };
        };
        let mut cells = vec![Category::Void; total];
        if size > 0 {
            // One distribution per depth, shared by every column.
            let distributions: Vec<Distribution> = (0..size)
                .map(|lz| self.distribution(z_offset.wrapping_add(lz as i64), offsets))
                .collect();

            cells
                .par_chunks_mut(plane)
                .enumerate()
                .for_each(|(lx, slab)| {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let x = x_offset.wrapping_add(lx as i64);
                    for (ly, column) in slab.chunks_mut(size).enumerate() {
                        let y = y_offset.wrapping_add(ly as i64);
                        for ((lz, cell), distribution) in
                            column.iter_mut().enumerate().zip(&distributions)
                        {
                            let z = z_offset.wrapping_add(lz as i64);
                            *cell = Self::resolve_with(seed, x, y, z, distribution);
                        }
                    }
                });
        }
        Grid3 { size, cells }
    }
}

/// Flag for callers that never abandon work.
pub(crate) static NEVER_STOP: AtomicBool = AtomicBool::new(false);

/// Resolve every column of a plane. Columns not yet started when `stop` is set are
/// skipped and keep their initial value.
fn fill_plane(
    cells: &mut [Category],
    size: usize,
    seed: &[u8],
    (x_offset, y_offset, z): (i64, i64, i64),
    distribution: &Distribution,
    stop: &AtomicBool,
) {
    cells
        .par_chunks_mut(size)
        .enumerate()
        .for_each(|(lx, column)| {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let x = x_offset.wrapping_add(lx as i64);
            for (ly, cell) in column.iter_mut().enumerate() {
                let y = y_offset.wrapping_add(ly as i64);
                *cell = MineralEngine::resolve_with(seed, x, y, z, distribution);
            }
        });
}
