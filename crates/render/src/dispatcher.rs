//! Ray March Dispatcher.
//!
//! Binds the scene and tile buffers and runs the march pass over the whole
//! viewport. Each pixel tests only the candidates of its own tile, in list
//! order, and keeps the nearest hit. Tiles with no candidates stay
//! background. Shading is the hit object's flat albedo.

use crate::compactor::TileBuffers;
use crate::config::MarchConfig;
use crate::{Camera, FrameImage, RenderError, TileGrid};
use compute::gpu_types::RayMarchUniforms;
use compute::layout::march_workgroups;
use compute::{BufferView, ComputeBackend, Kernel};
use scene::SceneBuffers;

pub struct RayMarchDispatcher {
    pub march: MarchConfig,
    pub clear_color: [f32; 4],
}

impl RayMarchDispatcher {
    #[must_use]
    pub fn new(march: MarchConfig, clear_color: [f32; 4]) -> Self {
        Self { march, clear_color }
    }

    /// # Errors
    ///
    /// Propagates dispatch failures and returns `RenderError::ReadbackSize` if
    /// the color or depth readback is malformed.
    pub fn dispatch(
        &self,
        backend: &dyn ComputeBackend,
        scene: &SceneBuffers,
        tiles: &TileBuffers,
        grid: &TileGrid,
        camera: &Camera,
    ) -> Result<FrameImage, RenderError> {
        let uniforms = RayMarchUniforms {
            inv_view_proj: camera.inverse_view_proj().to_cols_array_2d(),
            clear_color: self.clear_color,
            grid: [grid.width(), grid.height(), grid.tile_width(), grid.tile_height()],
            march: [
                grid.tiles_per_row(),
                grid.num_tiles() as u32,
                scene.object_count,
                self.march.max_steps,
            ],
            params: [self.march.hit_epsilon, self.march.min_step, camera.zfar, 0.0],
        };
        let pixels = grid.num_pixels();
        let binds = [
            scene.fields.clone(),
            scene.headers.clone(),
            tiles.headers.clone(),
            tiles.indices.clone(),
            BufferView::from_value(&uniforms),
            BufferView::zeroed::<[f32; 4]>(pixels),
            BufferView::zeroed::<f32>(pixels),
        ];

        let outputs = backend.dispatch(
            &Kernel::RayMarch,
            &binds,
            march_workgroups(grid.width(), grid.height()),
        )?;
        match outputs.as_slice() {
            [color, depth] => FrameImage::from_readback(grid.width(), grid.height(), color, depth),
            _ => Err(RenderError::ReadbackSize {
                what: "ray march outputs",
                expected: 2,
                actual: outputs.len(),
            }),
        }
    }
}
