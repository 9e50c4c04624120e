use crate::binner::{OccupancyBinner, OccupancyMatrix};
use crate::compactor::TileLists;
use crate::dispatcher::RayMarchDispatcher;
use crate::{Camera, FrameImage, OverflowPolicy, RenderConfig, RenderError, TileGrid};
use compute::ComputeBackend;
use scene::{SceneBufferAssembler, SdfObject};
use std::sync::Arc;

/// Counters of one rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub object_count: usize,
    /// Objects that got an occupancy row.
    pub binned_objects: usize,
    /// Objects past `max_objects`, never tested by the march.
    pub dropped_objects: usize,
    pub occupied_pairs: usize,
    /// Scene storage grew this frame.
    pub reallocated: bool,
    /// The tile lists were inconsistent and replaced by empty ones.
    pub fell_back: bool,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub image: FrameImage,
    /// Per-tile candidates the march used.
    pub tiles: TileLists,
    pub stats: FrameStats,
}

/// Runs assemble → bin → readback → compact → upload → march for each frame.
///
/// The stages run strictly in that order on the calling thread. An error
/// aborts the frame; no partial image is returned.
pub struct FramePipeline {
    backend: Arc<dyn ComputeBackend>,
    config: RenderConfig,
    grid: TileGrid,
    assembler: SceneBufferAssembler,
    binner: OccupancyBinner,
    dispatcher: RayMarchDispatcher,
    frame_index: u64,
}

impl FramePipeline {
    /// # Errors
    ///
    /// Returns `RenderError::Config` for an invalid configuration.
    pub fn new(backend: Arc<dyn ComputeBackend>, config: RenderConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let grid = TileGrid::new(
            config.viewport.width,
            config.viewport.height,
            config.tile_size.width,
            config.tile_size.height,
        )?;
        tracing::info!(
            width = grid.width(),
            height = grid.height(),
            tiles = grid.num_tiles(),
            max_objects = config.max_objects,
            "frame pipeline ready"
        );
        Ok(Self {
            backend,
            dispatcher: RayMarchDispatcher::new(config.march, config.clear_color),
            config,
            grid,
            assembler: SceneBufferAssembler::new(),
            binner: OccupancyBinner::new(),
            frame_index: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Rebuilds the tile grid for a new viewport.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidViewport` for a zero-sized viewport.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.grid.resize(width, height)?;
        self.config.viewport.width = width;
        self.config.viewport.height = height;
        tracing::debug!(width, height, tiles = self.grid.num_tiles(), "resized tile grid");
        Ok(())
    }

    /// Renders `objects` as seen by `camera`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::CapacityExceeded` under
    /// [`OverflowPolicy::Error`] when there are more objects than
    /// `max_objects`, and propagates scene and dispatch failures. An
    /// inconsistent occupancy readback is not an error: the frame is rendered
    /// as background only and [`FrameStats::fell_back`] is set.
    pub fn render(&mut self, objects: &[SdfObject], camera: &Camera) -> Result<Frame, RenderError> {
        let max_objects = self.config.max_objects as usize;
        let dropped_objects = objects.len().saturating_sub(max_objects);
        if dropped_objects > 0 {
            match self.config.overflow {
                OverflowPolicy::Error => {
                    return Err(RenderError::CapacityExceeded {
                        objects: objects.len(),
                        max: max_objects,
                    });
                }
                OverflowPolicy::Drop => tracing::warn!(
                    objects = objects.len(),
                    max_objects,
                    "dropping {dropped_objects} objects past the occupancy capacity"
                ),
            }
        }

        let scene = self.assembler.assemble(objects)?;

        let occupancy = match self.binner.bin(
            self.backend.as_ref(),
            &scene,
            &self.grid,
            &camera.view_proj(),
            self.config.max_objects,
        ) {
            Ok(matrix) => Some(matrix),
            Err(err @ RenderError::ReadbackSize { .. }) => {
                tracing::warn!("discarding occupancy readback: {err}");
                None
            }
            Err(err) => return Err(err),
        };
        let checked = occupancy.and_then(|matrix| self.compact(&matrix, scene.object_count));
        let fell_back = checked.is_none();
        let tiles = checked.unwrap_or_else(|| TileLists::empty(self.grid.num_tiles()));

        let image = self.dispatcher.dispatch(
            self.backend.as_ref(),
            &scene,
            &tiles.upload(),
            &self.grid,
            camera,
        )?;

        let stats = FrameStats {
            frame_index: self.frame_index,
            object_count: objects.len(),
            binned_objects: objects.len().min(max_objects),
            dropped_objects,
            occupied_pairs: tiles.occupied_pairs(),
            reallocated: scene.reallocated,
            fell_back,
        };
        self.frame_index += 1;
        tracing::debug!(?stats, "frame complete");
        Ok(Frame {
            image,
            tiles,
            stats,
        })
    }

    /// Compacted and validated tile lists, `None` if the matrix or the lists
    /// are inconsistent.
    fn compact(&self, matrix: &OccupancyMatrix, object_count: u32) -> Option<TileLists> {
        if !matrix.is_binary() {
            tracing::warn!("occupancy matrix holds non-binary flags, rendering background only");
            return None;
        }
        let tiles = TileLists::compact(matrix);
        match tiles.validate(self.grid.num_tiles(), object_count, self.config.max_objects) {
            Ok(()) => Some(tiles),
            Err(err) => {
                tracing::warn!("{err}, rendering background only");
                None
            }
        }
    }
}
