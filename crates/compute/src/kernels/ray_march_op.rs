use crate::gpu_types::{ObjectHeader, RayMarchUniforms, TileHeader};
use crate::kernels::{read_slice, read_value};
use crate::layout::{
    MARCH_COLOR_OUT, MARCH_DEPTH_OUT, MARCH_FIELDS, MARCH_OBJECTS, MARCH_TILE_HEADERS,
    MARCH_TILE_INDICES, MARCH_UNIFORMS,
};
use crate::{BufferView, ComputeError, Kernel};
use glam::{Mat4, UVec3, Vec3, Vec4};

/// World-space ray through a pixel center, `max_t` long.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub max_t: f32,
}

/// Step limits shared by every object of a pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchParams {
    pub max_steps: u32,
    pub hit_epsilon: f32,
    pub min_step: f32,
}

/// Unprojects the center of pixel `(x, y)` onto the near and far planes.
#[must_use]
pub fn primary_ray(inv_view_proj: &Mat4, x: u32, y: u32, width: f32, height: f32) -> Option<Ray> {
    let ndc_x = (x as f32 + 0.5) / width * 2.0 - 1.0;
    let ndc_y = 1.0 - (y as f32 + 0.5) / height * 2.0;
    let near = *inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = *inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    if near.w.abs() <= f32::EPSILON || far.w.abs() <= f32::EPSILON {
        return None;
    }
    let origin = near.truncate() / near.w;
    let span = far.truncate() / far.w - origin;
    let max_t = span.length();
    if max_t <= 0.0 {
        return None;
    }
    Some(Ray {
        origin,
        dir: span / max_t,
        max_t,
    })
}

fn safe_recip(c: f32) -> f32 {
    if c.abs() < 1e-8 {
        if c < 0.0 {
            -1e8
        } else {
            1e8
        }
    } else {
        1.0 / c
    }
}

/// Trilinear sample of the object's field at an object-space position.
///
/// Samples sit at voxel centers; positions outside the grid clamp to the
/// border samples.
#[must_use]
pub fn sample_field(header: &ObjectHeader, fields: &[f32], p: Vec3) -> f32 {
    let dims = UVec3::new(header.dims[0], header.dims[1], header.dims[2]);
    let lo = Vec3::from_slice(&header.local_min[..3]);
    let last = dims - 1;
    let g = ((p - lo) / header.voxel_size - Vec3::splat(0.5)).clamp(Vec3::ZERO, last.as_vec3());
    let base = g.floor();
    let f = g - base;
    let i0 = base.as_uvec3().min(last);
    let i1 = (i0 + 1).min(last);

    let start = header.start_offset as usize;
    let at = |x: u32, y: u32, z: u32| {
        fields[start + ((z * dims.y + y) * dims.x + x) as usize]
    };
    let c00 = lerp(at(i0.x, i0.y, i0.z), at(i1.x, i0.y, i0.z), f.x);
    let c10 = lerp(at(i0.x, i1.y, i0.z), at(i1.x, i1.y, i0.z), f.x);
    let c01 = lerp(at(i0.x, i0.y, i1.z), at(i1.x, i0.y, i1.z), f.x);
    let c11 = lerp(at(i0.x, i1.y, i1.z), at(i1.x, i1.y, i1.z), f.x);
    lerp(lerp(c00, c10, f.y), lerp(c01, c11, f.y), f.z)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sphere-traces one object along a world-space ray.
///
/// Returns the world-space distance of the first sample closer than
/// `hit_epsilon` to the surface, or `None` if the ray leaves the field box
/// first.
#[must_use]
pub fn march_object(
    header: &ObjectHeader,
    fields: &[f32],
    ray: &Ray,
    params: &MarchParams,
) -> Option<f32> {
    let world_to_object = Mat4::from_cols_array_2d(&header.world_to_object);
    let origin = (world_to_object * ray.origin.extend(1.0)).truncate();
    let scaled_dir = (world_to_object * ray.dir.extend(0.0)).truncate();
    let scale = scaled_dir.length();
    if scale <= 0.0 {
        return None;
    }
    let dir = scaled_dir / scale;

    let lo = Vec3::from_slice(&header.local_min[..3]);
    let hi = Vec3::from_slice(&header.local_max[..3]);
    let inv = Vec3::new(safe_recip(dir.x), safe_recip(dir.y), safe_recip(dir.z));
    let t0 = (lo - origin) * inv;
    let t1 = (hi - origin) * inv;
    let t_enter = t0.min(t1).max_element().max(0.0);
    let t_exit = t0.max(t1).min_element().min(ray.max_t * scale);
    if t_enter > t_exit {
        return None;
    }

    let mut t = t_enter;
    for _ in 0..params.max_steps {
        let distance = sample_field(header, fields, origin + dir * t);
        if distance < params.hit_epsilon {
            return Some(t / scale);
        }
        t += distance.max(params.min_step);
        if t > t_exit {
            break;
        }
    }
    None
}

fn check_headers(
    objects: &[ObjectHeader],
    fields: &[f32],
    object_count: usize,
) -> Result<(), ComputeError> {
    if objects.len() < object_count {
        return Err(ComputeError::ShapeMismatch(
            "RayMarch object count exceeds the header buffer",
        ));
    }
    for header in &objects[..object_count] {
        let [x, y, z, _] = header.dims;
        let cells = x as usize * y as usize * z as usize;
        let end = header.start_offset as usize + header.num_entries as usize;
        if cells == 0 || cells != header.num_entries as usize || end > fields.len() {
            return Err(ComputeError::ShapeMismatch(
                "RayMarch object header does not describe a slice of the field buffer",
            ));
        }
        if header.voxel_size.is_nan() || header.voxel_size <= 0.0 {
            return Err(ComputeError::ShapeMismatch(
                "RayMarch object header has a non-positive voxel size",
            ));
        }
    }
    Ok(())
}

/// CPU implementation of the tiled ray-march pass.
///
/// Every pixel only tests the objects listed for its tile, in list order; the
/// nearest hit wins and ties keep the earlier candidate. Pixels without a hit
/// get the clear color and the far distance as depth.
pub fn handle_ray_march(binds: &[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError> {
    if binds.len() < Kernel::RayMarch.binding_count() as usize {
        return Err(ComputeError::ShapeMismatch(
            "RayMarch kernel expects 7 buffers (fields, objects, tile headers, tile indices, uniforms, color, depth)",
        ));
    }
    let fields = read_slice::<f32>(
        &binds[MARCH_FIELDS as usize],
        "RayMarch field buffer must contain f32 samples",
    )?;
    let objects = read_slice::<ObjectHeader>(
        &binds[MARCH_OBJECTS as usize],
        "RayMarch objects buffer must contain ObjectHeader elements",
    )?;
    let tiles = read_slice::<TileHeader>(
        &binds[MARCH_TILE_HEADERS as usize],
        "RayMarch tile header buffer must contain TileHeader elements",
    )?;
    let indices = read_slice::<u32>(
        &binds[MARCH_TILE_INDICES as usize],
        "RayMarch tile index buffer must contain u32 object ids",
    )?;
    let uniforms = read_value::<RayMarchUniforms>(
        &binds[MARCH_UNIFORMS as usize],
        "RayMarch uniforms buffer must hold one RayMarchUniforms",
    )?;

    let [width, height, tile_w, tile_h] = uniforms.grid;
    let [tiles_per_row, num_tiles, object_count, max_steps] = uniforms.march;
    if width == 0 || height == 0 || tile_w == 0 || tile_h == 0 {
        return Err(ComputeError::ShapeMismatch(
            "RayMarch viewport and tile size must be non-zero",
        ));
    }
    if tiles_per_row != width.div_ceil(tile_w)
        || num_tiles as usize != tiles_per_row as usize * height.div_ceil(tile_h) as usize
        || tiles.len() != num_tiles as usize
    {
        return Err(ComputeError::ShapeMismatch(
            "RayMarch tile headers do not match the viewport",
        ));
    }

    let pixels = width as usize * height as usize;
    let color_view = &binds[MARCH_COLOR_OUT as usize];
    let depth_view = &binds[MARCH_DEPTH_OUT as usize];
    if color_view.element_size_in_bytes != std::mem::size_of::<[f32; 4]>()
        || color_view.len() != pixels
        || depth_view.element_size_in_bytes != std::mem::size_of::<f32>()
        || depth_view.len() != pixels
    {
        return Err(ComputeError::ShapeMismatch(
            "RayMarch color and depth outputs must hold one element per pixel",
        ));
    }

    check_headers(&objects, &fields, object_count as usize)?;
    for tile in tiles.iter() {
        let end = tile.offset as usize + tile.num_objects as usize;
        if end > indices.len() {
            return Err(ComputeError::ShapeMismatch(
                "RayMarch tile header points past the index buffer",
            ));
        }
        if indices[tile.offset as usize..end]
            .iter()
            .any(|&id| id >= object_count)
        {
            return Err(ComputeError::ShapeMismatch(
                "RayMarch tile index refers to an unknown object",
            ));
        }
    }

    let inv_view_proj = Mat4::from_cols_array_2d(&uniforms.inv_view_proj);
    let params = MarchParams {
        max_steps,
        hit_epsilon: uniforms.params[0],
        min_step: uniforms.params[1],
    };
    let far = uniforms.params[2];

    let mut color = vec![uniforms.clear_color; pixels];
    let mut depth = vec![far; pixels];
    for y in 0..height {
        for x in 0..width {
            let tile = &tiles[((y / tile_h) * tiles_per_row + x / tile_w) as usize];
            if tile.num_objects == 0 {
                continue;
            }
            let Some(ray) = primary_ray(&inv_view_proj, x, y, width as f32, height as f32) else {
                continue;
            };
            let pixel = (y * width + x) as usize;
            let run = &indices[tile.offset as usize..(tile.offset + tile.num_objects) as usize];
            for &object_id in run {
                let header = &objects[object_id as usize];
                if let Some(t) = march_object(header, &fields, &ray, &params) {
                    if t < depth[pixel] {
                        depth[pixel] = t;
                        color[pixel] = header.albedo;
                    }
                }
            }
        }
    }

    Ok(vec![
        bytemuck::cast_slice(&color).to_vec(),
        bytemuck::cast_slice(&depth).to_vec(),
    ])
}
