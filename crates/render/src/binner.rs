//! Occupancy Binner.
//!
//! Dispatches the bin pass and turns its readback into an
//! [`OccupancyMatrix`]. The dispatch return value is the synchronous
//! device→host transfer of the frame: the host stalls until the bin pass has
//! finished and the flags are in host memory. Replacing the host compaction
//! with a device-side scan would only change what happens after this point.

use crate::{RenderError, TileGrid};
use compute::gpu_types::BinUniforms;
use compute::layout::bin_workgroups;
use compute::{BufferView, ComputeBackend, Kernel};
use glam::Mat4;
use scene::SceneBuffers;

/// Host copy of the `max_objects × num_tiles` presence flags, object-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMatrix {
    max_objects: usize,
    num_tiles: usize,
    flags: Vec<u32>,
}

impl OccupancyMatrix {
    /// # Errors
    ///
    /// Returns `RenderError::ReadbackSize` if `flags` does not have exactly
    /// `max_objects * num_tiles` entries.
    pub fn new(max_objects: usize, num_tiles: usize, flags: Vec<u32>) -> Result<Self, RenderError> {
        let expected = max_objects * num_tiles;
        if flags.len() != expected {
            return Err(RenderError::ReadbackSize {
                what: "occupancy matrix",
                expected: expected * std::mem::size_of::<u32>(),
                actual: flags.len() * std::mem::size_of::<u32>(),
            });
        }
        Ok(Self {
            max_objects,
            num_tiles,
            flags,
        })
    }

    /// Decodes the bytes returned by the bin pass.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::ReadbackSize` on a length mismatch.
    pub fn from_readback(bytes: &[u8], max_objects: usize, num_tiles: usize) -> Result<Self, RenderError> {
        let expected = max_objects * num_tiles * std::mem::size_of::<u32>();
        if bytes.len() != expected {
            return Err(RenderError::ReadbackSize {
                what: "occupancy matrix",
                expected,
                actual: bytes.len(),
            });
        }
        let flags = bytes
            .chunks_exact(std::mem::size_of::<u32>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
        Self::new(max_objects, num_tiles, flags)
    }

    #[must_use]
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.num_tiles
    }

    #[must_use]
    pub fn flags(&self) -> &[u32] {
        &self.flags
    }

    /// Whether `object_id` was flagged in `tile`.
    #[must_use]
    pub fn get(&self, object_id: usize, tile: usize) -> bool {
        object_id < self.max_objects
            && tile < self.num_tiles
            && self.flags[object_id * self.num_tiles + tile] != 0
    }

    /// Number of set flags.
    #[must_use]
    pub fn occupied_pairs(&self) -> usize {
        self.flags.iter().filter(|&&f| f != 0).count()
    }

    /// `true` when every flag is 0 or 1.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.flags.iter().all(|&f| f <= 1)
    }

    /// Tiles flagged for `object_id`.
    pub fn tiles_of(&self, object_id: usize) -> impl Iterator<Item = usize> + '_ {
        let row = if object_id < self.max_objects {
            &self.flags[object_id * self.num_tiles..(object_id + 1) * self.num_tiles]
        } else {
            &[][..]
        };
        row.iter()
            .enumerate()
            .filter(|(_, &f)| f != 0)
            .map(|(tile, _)| tile)
    }
}

/// Runs the bin pass.
///
/// Keeps a zero-filled flag buffer for the current matrix size so every frame
/// starts from cleared flags without reallocating.
#[derive(Default)]
pub struct OccupancyBinner {
    cleared: Option<BufferView>,
}

impl OccupancyBinner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cleared_flags(&mut self, len: usize) -> BufferView {
        match &self.cleared {
            Some(view) if view.len() == len => view.clone(),
            _ => {
                tracing::debug!(flags = len, "allocating occupancy matrix");
                let view = BufferView::zeroed::<u32>(len);
                self.cleared = Some(view.clone());
                view
            }
        }
    }

    /// Flags every tile the first `min(object_count, max_objects)` objects may
    /// cover and reads the matrix back.
    ///
    /// # Errors
    ///
    /// Propagates dispatch failures and returns `RenderError::ReadbackSize` if
    /// the backend hands back a malformed matrix.
    pub fn bin(
        &mut self,
        backend: &dyn ComputeBackend,
        scene: &SceneBuffers,
        grid: &TileGrid,
        view_proj: &Mat4,
        max_objects: u32,
    ) -> Result<OccupancyMatrix, RenderError> {
        let num_tiles = grid.num_tiles();
        let uniforms = BinUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            grid: [grid.width(), grid.height(), grid.tile_width(), grid.tile_height()],
            counts: [
                grid.tiles_per_row(),
                grid.tiles_per_column(),
                scene.object_count,
                max_objects,
            ],
        };
        let flags = self.cleared_flags(max_objects as usize * num_tiles);
        let binds = [
            scene.headers.clone(),
            BufferView::from_value(&uniforms),
            flags,
        ];

        let workgroups = bin_workgroups(scene.object_count.min(max_objects));
        let outputs = backend.dispatch(&Kernel::BinOccupancy, &binds, workgroups)?;
        let Some(readback) = outputs.first() else {
            return Err(RenderError::ReadbackSize {
                what: "occupancy matrix",
                expected: max_objects as usize * num_tiles * std::mem::size_of::<u32>(),
                actual: 0,
            });
        };
        let matrix = OccupancyMatrix::from_readback(readback, max_objects as usize, num_tiles)?;
        tracing::trace!(
            objects = scene.object_count,
            occupied = matrix.occupied_pairs(),
            "binned objects into tiles"
        );
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_readback_checks_length() {
        let bytes = bytemuck::cast_slice(&[0u32, 1, 0]).to_vec();
        assert!(matches!(
            OccupancyMatrix::from_readback(&bytes, 2, 2),
            Err(RenderError::ReadbackSize { expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn matrix_is_object_major() {
        let matrix = OccupancyMatrix::new(2, 3, vec![1, 0, 0, 0, 1, 1]).unwrap();
        assert!(matrix.get(0, 0));
        assert!(!matrix.get(0, 1));
        assert!(matrix.get(1, 2));
        assert!(!matrix.get(2, 0));
        assert_eq!(matrix.occupied_pairs(), 3);
        assert_eq!(matrix.tiles_of(1).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(matrix.tiles_of(5).count(), 0);
    }

    #[test]
    fn non_binary_flags_are_detected() {
        let matrix = OccupancyMatrix::new(1, 2, vec![1, 7]).unwrap();
        assert!(!matrix.is_binary());
    }
}
