//! Screen partition into fixed-size tiles.
//!
//! Tiles are numbered row-major from the top-left corner. Tiles on the right
//! and bottom edges are clipped to the viewport.

use crate::RenderError;

/// Pixel rectangle of one tile, end exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    tiles_per_row: u32,
    tiles_per_column: u32,
}

impl TileGrid {
    /// # Errors
    ///
    /// Returns `RenderError::InvalidViewport` if any size is zero.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(RenderError::InvalidViewport {
                width,
                height,
                tile_width,
                tile_height,
            });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles_per_row: width.div_ceil(tile_width),
            tiles_per_column: height.div_ceil(tile_height),
        })
    }

    /// Recomputes the grid for a new viewport, keeping the tile size.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidViewport` for a zero-sized viewport; the
    /// grid is left unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        *self = Self::new(width, height, self.tile_width, self.tile_height)?;
        Ok(())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    #[must_use]
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    #[must_use]
    pub fn tiles_per_row(&self) -> u32 {
        self.tiles_per_row
    }

    #[must_use]
    pub fn tiles_per_column(&self) -> u32 {
        self.tiles_per_column
    }

    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.tiles_per_row as usize * self.tiles_per_column as usize
    }

    #[must_use]
    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Tile containing pixel `(x, y)`.
    #[must_use]
    pub fn tile_index(&self, x: u32, y: u32) -> usize {
        (y / self.tile_height) as usize * self.tiles_per_row as usize + (x / self.tile_width) as usize
    }

    #[must_use]
    pub fn tile_rect(&self, tile: usize) -> Option<TileRect> {
        if tile >= self.num_tiles() {
            return None;
        }
        let column = (tile % self.tiles_per_row as usize) as u32;
        let row = (tile / self.tiles_per_row as usize) as u32;
        let x0 = column * self.tile_width;
        let y0 = row * self.tile_height;
        Some(TileRect {
            x0,
            y0,
            x1: (x0 + self.tile_width).min(self.width),
            y1: (y0 + self.tile_height).min(self.height),
        })
    }
}
