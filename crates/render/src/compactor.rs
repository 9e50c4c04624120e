//! Occupancy Compactor.
//!
//! Turns the host copy of the occupancy matrix into per-tile object lists in
//! CSR form: one [`TileHeader`] per tile pointing at a run of the index array.
//! Runs list object ids in ascending order and tile `t + 1` starts where tile
//! `t` ends, so an empty tile's offset equals the next tile's offset.

use crate::binner::OccupancyMatrix;
use crate::RenderError;
use compute::gpu_types::TileHeader;
use compute::BufferView;

/// Device-ready views of a [`TileLists`].
#[derive(Clone, Debug)]
pub struct TileBuffers {
    pub headers: BufferView,
    pub indices: BufferView,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileLists {
    headers: Vec<TileHeader>,
    indices: Vec<u32>,
}

impl TileLists {
    /// Compacts `matrix` tile by tile, scanning object ids in ascending order.
    #[must_use]
    pub fn compact(matrix: &OccupancyMatrix) -> Self {
        let num_tiles = matrix.num_tiles();
        let flags = matrix.flags();
        let mut headers = Vec::with_capacity(num_tiles);
        let mut indices = Vec::new();
        let mut running = 0u32;
        for tile in 0..num_tiles {
            let mut num_objects = 0u32;
            for object_id in 0..matrix.max_objects() {
                if flags[object_id * num_tiles + tile] != 0 {
                    indices.push(object_id as u32);
                    num_objects += 1;
                }
            }
            headers.push(TileHeader {
                offset: running,
                num_objects,
            });
            running += num_objects;
        }
        Self { headers, indices }
    }

    /// Lists with no candidates anywhere, so every pixel is background.
    #[must_use]
    pub fn empty(num_tiles: usize) -> Self {
        Self {
            headers: vec![TileHeader::default(); num_tiles],
            indices: Vec::new(),
        }
    }

    #[must_use]
    pub fn headers(&self) -> &[TileHeader] {
        &self.headers
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.headers.len()
    }

    /// Total (object, tile) pairs across all runs.
    #[must_use]
    pub fn occupied_pairs(&self) -> usize {
        self.indices.len()
    }

    /// Object ids the ray march tests for `tile`, in test order.
    #[must_use]
    pub fn candidates(&self, tile: usize) -> &[u32] {
        match self.headers.get(tile) {
            Some(h) => self
                .indices
                .get(h.offset as usize..(h.offset + h.num_objects) as usize)
                .unwrap_or(&[]),
            None => &[],
        }
    }

    /// Checks that the lists partition the index array and only reference
    /// objects below `object_count`, with no more than `max_objects` per tile.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::TileList` describing the first violation.
    pub fn validate(
        &self,
        num_tiles: usize,
        object_count: u32,
        max_objects: u32,
    ) -> Result<(), RenderError> {
        if self.headers.len() != num_tiles {
            return Err(RenderError::TileList(format!(
                "{} headers for {num_tiles} tiles",
                self.headers.len()
            )));
        }
        let mut expected_offset = 0usize;
        for (tile, header) in self.headers.iter().enumerate() {
            if header.offset as usize != expected_offset {
                return Err(RenderError::TileList(format!(
                    "tile {tile} starts at {} instead of {expected_offset}",
                    header.offset
                )));
            }
            if header.num_objects > max_objects {
                return Err(RenderError::TileList(format!(
                    "tile {tile} lists {} objects, more than {max_objects}",
                    header.num_objects
                )));
            }
            expected_offset += header.num_objects as usize;
            if expected_offset > self.indices.len() {
                return Err(RenderError::TileList(format!(
                    "tile {tile} runs past the index array"
                )));
            }
            let run = self.candidates(tile);
            if let Some(&id) = run.iter().find(|&&id| id >= object_count) {
                return Err(RenderError::TileList(format!(
                    "tile {tile} references object {id} of {object_count}"
                )));
            }
            if run.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(RenderError::TileList(format!(
                    "tile {tile} run is not strictly ascending"
                )));
            }
        }
        if expected_offset != self.indices.len() {
            return Err(RenderError::TileList(format!(
                "runs cover {expected_offset} of {} indices",
                self.indices.len()
            )));
        }
        Ok(())
    }

    /// Copies the headers and index array into device views.
    #[must_use]
    pub fn upload(&self) -> TileBuffers {
        TileBuffers {
            headers: BufferView::from_slice(&self.headers),
            indices: BufferView::from_slice(&self.indices),
        }
    }
}
