use crate::{Aabb, VoxelField};
use glam::{Mat4, Vec4};
use std::sync::Arc;

/// A voxel field placed in the world.
///
/// Several objects may share one field; the assembler uses the `Arc` identity
/// to tell whether the flattened field buffer is still current.
#[derive(Clone, Debug)]
pub struct SdfObject {
    pub field: Arc<VoxelField>,
    /// Object space to world space.
    pub world_transform: Mat4,
    pub albedo: Vec4,
}

impl SdfObject {
    #[must_use]
    pub fn new(field: Arc<VoxelField>, world_transform: Mat4) -> Self {
        Self {
            field,
            world_transform,
            albedo: Vec4::ONE,
        }
    }

    #[must_use]
    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.albedo = albedo;
        self
    }

    /// World-space AABB of the field bounds.
    #[must_use]
    pub fn world_bounds(&self) -> Aabb {
        self.field.bounds().transformed(&self.world_transform)
    }
}
