use crate::gpu_types::{BinUniforms, ObjectHeader, BEHIND_EYE_W};
use crate::kernels::{read_slice, read_value};
use crate::layout::{BIN_FLAGS_OUT, BIN_OBJECTS, BIN_UNIFORMS};
use crate::{BufferView, ComputeError, Kernel};
use glam::{Mat4, Vec2, Vec3};

/// Tiles an object's projected bounds may cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    /// Behind the eye, beyond the far plane or off-screen.
    Hidden,
    /// Straddles the eye plane; every tile is marked.
    Everywhere,
    /// Tile columns `x0..x1` and rows `y0..y1`, end exclusive.
    Tiles { x0: u32, x1: u32, y0: u32, y1: u32 },
}

/// Projects the 8 corners of the object's field box and returns the tile
/// rectangle containing their screen-space bounding rectangle.
///
/// The rectangle test is exact on the projected corners, so a tile is only
/// missed if no corner hull overlaps it.
#[must_use]
pub fn object_coverage(header: &ObjectHeader, uniforms: &BinUniforms) -> Coverage {
    let object_to_world = Mat4::from_cols_array_2d(&header.object_to_world);
    let view_proj = Mat4::from_cols_array_2d(&uniforms.view_proj);
    let lo = Vec3::from_slice(&header.local_min[..3]);
    let hi = Vec3::from_slice(&header.local_max[..3]);

    let mut ndc_min = Vec2::splat(f32::MAX);
    let mut ndc_max = Vec2::splat(f32::MIN);
    let mut nearest_z = f32::MAX;
    let mut behind = 0u32;
    for corner in 0..8u32 {
        let local = Vec3::new(
            if corner & 1 != 0 { hi.x } else { lo.x },
            if corner & 2 != 0 { hi.y } else { lo.y },
            if corner & 4 != 0 { hi.z } else { lo.z },
        );
        let world = object_to_world * local.extend(1.0);
        let clip = view_proj * world;
        if clip.w <= BEHIND_EYE_W {
            behind += 1;
            continue;
        }
        let ndc = clip.truncate() / clip.w;
        ndc_min = ndc_min.min(ndc.truncate());
        ndc_max = ndc_max.max(ndc.truncate());
        nearest_z = nearest_z.min(ndc.z);
    }

    if behind == 8 {
        return Coverage::Hidden;
    }
    if behind > 0 {
        return Coverage::Everywhere;
    }
    if nearest_z > 1.0 {
        return Coverage::Hidden;
    }

    let width = uniforms.grid[0] as f32;
    let height = uniforms.grid[1] as f32;
    let px_min = (ndc_min.x * 0.5 + 0.5) * width;
    let px_max = (ndc_max.x * 0.5 + 0.5) * width;
    // NDC y points up, pixel rows grow downwards.
    let py_min = (0.5 - ndc_max.y * 0.5) * height;
    let py_max = (0.5 - ndc_min.y * 0.5) * height;
    if px_max <= 0.0 || py_max <= 0.0 || px_min >= width || py_min >= height {
        return Coverage::Hidden;
    }

    let (x0, x1) = tile_span(px_min, px_max, width, uniforms.grid[2] as f32, uniforms.counts[0]);
    let (y0, y1) = tile_span(py_min, py_max, height, uniforms.grid[3] as f32, uniforms.counts[1]);
    Coverage::Tiles { x0, x1, y0, y1 }
}

/// Tiles touched by the pixel interval `[lo, hi)`, at least one.
fn tile_span(lo: f32, hi: f32, extent: f32, tile: f32, count: u32) -> (u32, u32) {
    let start = ((lo.max(0.0) / tile).floor() as u32).min(count - 1);
    let end = ((hi.min(extent) / tile).ceil() as u32).clamp(start + 1, count);
    (start, end)
}

/// CPU implementation of the occupancy bin pass.
///
/// Bindings: object headers, [`BinUniforms`], and the `max_objects × num_tiles`
/// u32 flag matrix. The returned matrix starts cleared, so flags from an
/// earlier frame never survive a dispatch. Objects with an id at or above
/// `max_objects` get no row and are never marked.
pub fn handle_bin_occupancy(binds: &[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError> {
    if binds.len() < Kernel::BinOccupancy.binding_count() as usize {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy kernel expects 3 buffers (objects, uniforms, flags)",
        ));
    }
    let objects = read_slice::<ObjectHeader>(
        &binds[BIN_OBJECTS as usize],
        "BinOccupancy objects buffer must contain ObjectHeader elements",
    )?;
    let uniforms = read_value::<BinUniforms>(
        &binds[BIN_UNIFORMS as usize],
        "BinOccupancy uniforms buffer must hold one BinUniforms",
    )?;
    let flags_view = &binds[BIN_FLAGS_OUT as usize];
    if flags_view.element_size_in_bytes != std::mem::size_of::<u32>() {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy flags buffer must contain u32 elements",
        ));
    }

    if uniforms.grid.iter().any(|&v| v == 0) {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy viewport and tile size must be non-zero",
        ));
    }
    let [width, height, tile_w, tile_h] = uniforms.grid;
    if uniforms.counts[0] != width.div_ceil(tile_w) || uniforms.counts[1] != height.div_ceil(tile_h) {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy tile counts do not match the viewport",
        ));
    }

    let num_tiles = uniforms.num_tiles();
    let max_objects = uniforms.counts[3] as usize;
    if flags_view.len() != max_objects * num_tiles {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy flags buffer must hold max_objects * num_tiles flags",
        ));
    }
    let binned = uniforms.binned_objects();
    if objects.len() < binned {
        return Err(ComputeError::ShapeMismatch(
            "BinOccupancy object count exceeds the header buffer",
        ));
    }

    let tiles_per_row = uniforms.counts[0] as usize;
    let mut flags = vec![0u32; max_objects * num_tiles];
    for (object_id, header) in objects.iter().take(binned).enumerate() {
        let row = &mut flags[object_id * num_tiles..(object_id + 1) * num_tiles];
        match object_coverage(header, &uniforms) {
            Coverage::Hidden => {}
            Coverage::Everywhere => row.fill(1),
            Coverage::Tiles { x0, x1, y0, y1 } => {
                for ty in y0 as usize..y1 as usize {
                    row[ty * tiles_per_row + x0 as usize..ty * tiles_per_row + x1 as usize].fill(1);
                }
            }
        }
    }

    let out_bytes = bytemuck::cast_slice(&flags).to_vec();
    Ok(vec![out_bytes])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComputeBackend, CpuBackend};

    /// Orthographic camera whose world x/y equal pixel coordinates of a
    /// `size × size` viewport, looking down -z.
    fn pixel_space_view_proj(size: f32) -> [[f32; 4]; 4] {
        Mat4::orthographic_rh(0.0, size, size, 0.0, 0.1, 100.0).to_cols_array_2d()
    }

    /// Object whose field box spans `min..max` in world space (identity rotation).
    fn boxed_object(id: u32, min: Vec3, max: Vec3) -> ObjectHeader {
        let center = (min + max) * 0.5;
        let object_to_world = Mat4::from_translation(center);
        let half = (max - min) * 0.5;
        ObjectHeader {
            world_to_object: object_to_world.inverse().to_cols_array_2d(),
            object_to_world: object_to_world.to_cols_array_2d(),
            local_min: (-half).extend(0.0).to_array(),
            local_max: half.extend(0.0).to_array(),
            world_min: min.extend(0.0).to_array(),
            world_max: max.extend(0.0).to_array(),
            albedo: [1.0; 4],
            dims: [1, 1, 1, 0],
            start_offset: id,
            num_entries: 1,
            voxel_size: 1.0,
            object_id: id,
        }
    }

    fn uniforms(size: u32, tile: u32, objects: u32, max_objects: u32) -> BinUniforms {
        BinUniforms {
            view_proj: pixel_space_view_proj(size as f32),
            grid: [size, size, tile, tile],
            counts: [size.div_ceil(tile), size.div_ceil(tile), objects, max_objects],
        }
    }

    fn run(objects: &[ObjectHeader], uniforms: BinUniforms) -> Vec<u32> {
        let flags = uniforms.counts[3] as usize * uniforms.num_tiles();
        let binds = [
            BufferView::from_slice(objects),
            BufferView::from_value(&uniforms),
            BufferView::zeroed::<u32>(flags),
        ];
        let out = CpuBackend::new()
            .dispatch(&Kernel::BinOccupancy, &binds, [1, 1, 1])
            .expect("Dispatch for BinOccupancy failed");
        assert_eq!(out.len(), 1);
        bytemuck::cast_slice(&out[0]).to_vec()
    }

    #[test]
    fn box_covering_one_tile_marks_only_that_tile() {
        let a = boxed_object(0, Vec3::new(0.0, 0.0, -5.0), Vec3::new(8.0, 8.0, -3.0));
        let flags = run(&[a], uniforms(16, 8, 1, 4));
        assert_eq!(&flags[0..4], &[1, 0, 0, 0]);
        assert!(flags[4..].iter().all(|&f| f == 0));
    }

    #[test]
    fn right_half_box_marks_right_column() {
        let b = boxed_object(0, Vec3::new(8.0, 0.0, -5.0), Vec3::new(16.0, 16.0, -3.0));
        let flags = run(&[b], uniforms(16, 8, 1, 1));
        assert_eq!(flags, vec![0, 1, 0, 1]);
    }

    #[test]
    fn sub_tile_box_marks_its_tile() {
        let c = boxed_object(0, Vec3::new(9.5, 9.5, -5.0), Vec3::new(10.0, 10.0, -3.0));
        let flags = run(&[c], uniforms(16, 8, 1, 1));
        assert_eq!(flags, vec![0, 0, 0, 1]);
    }

    #[test]
    fn offscreen_box_marks_nothing() {
        let d = boxed_object(0, Vec3::new(20.0, 0.0, -5.0), Vec3::new(30.0, 8.0, -3.0));
        let flags = run(&[d], uniforms(16, 8, 1, 1));
        assert!(flags.iter().all(|&f| f == 0));
    }

    #[test]
    fn partially_offscreen_box_is_clamped() {
        let e = boxed_object(0, Vec3::new(-20.0, 4.0, -5.0), Vec3::new(4.0, 6.0, -3.0));
        let flags = run(&[e], uniforms(16, 8, 1, 1));
        assert_eq!(flags, vec![1, 0, 0, 0]);
    }

    #[test]
    fn objects_beyond_max_objects_are_not_binned() {
        let objects: Vec<ObjectHeader> = (0..3)
            .map(|i| boxed_object(i, Vec3::new(0.0, 0.0, -5.0), Vec3::new(16.0, 16.0, -3.0)))
            .collect();
        let flags = run(&objects, uniforms(16, 8, 3, 2));
        assert_eq!(flags.len(), 2 * 4);
        assert!(flags.iter().all(|&f| f == 1));
    }

    #[test]
    fn box_straddling_the_eye_marks_every_tile() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let mut u = uniforms(16, 8, 1, 1);
        u.view_proj = (proj * view).to_cols_array_2d();
        let f = boxed_object(0, Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(object_coverage(&f, &u), Coverage::Everywhere);

        let behind = boxed_object(0, Vec3::new(-1.0, -1.0, 2.0), Vec3::new(1.0, 1.0, 3.0));
        assert_eq!(object_coverage(&behind, &u), Coverage::Hidden);
    }

    #[test]
    fn mismatched_flag_buffer_is_rejected() {
        let a = boxed_object(0, Vec3::new(0.0, 0.0, -5.0), Vec3::new(8.0, 8.0, -3.0));
        let binds = [
            BufferView::from_slice(&[a]),
            BufferView::from_value(&uniforms(16, 8, 1, 4)),
            BufferView::zeroed::<u32>(3),
        ];
        let result = CpuBackend::new().dispatch(&Kernel::BinOccupancy, &binds, [1, 1, 1]);
        assert!(matches!(result, Err(ComputeError::ShapeMismatch(_))));
    }
}
