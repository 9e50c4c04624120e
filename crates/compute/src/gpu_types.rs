//! GPU-compatible type definitions shared by host code, the CPU kernels and the
//! WGSL shaders.
//!
//! Every type is `#[repr(C)]` and Pod. Only scalars, 4-component vectors and
//! 4x4 matrices are used so the Rust layout equals the WGSL storage and uniform
//! layout without hidden padding.

use bytemuck::{Pod, Zeroable};

/// Per-object record of the scene header table.
///
/// WGSL layout (240 bytes):
///   offset   0: world_to_object (mat4x4<f32>)
///   offset  64: object_to_world (mat4x4<f32>)
///   offset 128: local_min  (vec4<f32>, w unused)
///   offset 144: local_max  (vec4<f32>, w unused)
///   offset 160: world_min  (vec4<f32>, w unused)
///   offset 176: world_max  (vec4<f32>, w unused)
///   offset 192: albedo     (vec4<f32>)
///   offset 208: dims       (vec4<u32>, w unused)
///   offset 224: start_offset, num_entries (u32), voxel_size (f32), object_id (u32)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectHeader {
    /// Column-major transform from world space into the field's object space.
    pub world_to_object: [[f32; 4]; 4],
    /// Inverse of `world_to_object`.
    pub object_to_world: [[f32; 4]; 4],
    /// Object-space corner of the field bounds.
    pub local_min: [f32; 4],
    pub local_max: [f32; 4],
    /// World-space AABB of the transformed field bounds.
    pub world_min: [f32; 4],
    pub world_max: [f32; 4],
    pub albedo: [f32; 4],
    /// Grid resolution along x, y and z.
    pub dims: [u32; 4],
    /// First sample of this object in the flattened field buffer.
    pub start_offset: u32,
    pub num_entries: u32,
    pub voxel_size: f32,
    pub object_id: u32,
}

const _: () = assert!(std::mem::size_of::<ObjectHeader>() == 240);

/// Start and length of one tile's run in the tile index array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct TileHeader {
    pub offset: u32,
    pub num_objects: u32,
}

const _: () = assert!(std::mem::size_of::<TileHeader>() == 8);

/// Uniform block of the occupancy bin pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BinUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// width, height, tile_width, tile_height in pixels
    pub grid: [u32; 4],
    /// tiles_per_row, tiles_per_column, object_count, max_objects
    pub counts: [u32; 4],
}

const _: () = assert!(std::mem::size_of::<BinUniforms>() == 96);

impl BinUniforms {
    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.counts[0] as usize * self.counts[1] as usize
    }

    /// Objects that get a row in the occupancy matrix.
    #[must_use]
    pub fn binned_objects(&self) -> usize {
        self.counts[2].min(self.counts[3]) as usize
    }
}

/// Uniform block of the ray-march pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RayMarchUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub clear_color: [f32; 4],
    /// width, height, tile_width, tile_height in pixels
    pub grid: [u32; 4],
    /// tiles_per_row, num_tiles, object_count, max_steps
    pub march: [u32; 4],
    /// hit_epsilon, min_step, far distance, unused
    pub params: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<RayMarchUniforms>() == 128);

/// Clip-space `w` below which a projected point counts as behind the eye.
pub const BEHIND_EYE_W: f32 = 1e-6;
