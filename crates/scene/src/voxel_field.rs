//! Dense signed-distance grids.
//!
//! Values are stored x fastest, `index = (z * dim_y + y) * dim_x + x`, with
//! sample `(x, y, z)` located at the center of its voxel:
//! `bounds.min + (i + 0.5) * voxel_size`.

use crate::{Aabb, SceneError};
use glam::{UVec3, Vec3};

/// Immutable distance grid in object space.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelField {
    bounds: Aabb,
    voxel_size: f32,
    dims: UVec3,
    values: Vec<f32>,
}

impl VoxelField {
    /// Wraps `values` after checking them against the grid implied by
    /// `bounds` and `voxel_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the voxel size is not finite and positive, the
    /// bounds are degenerate, or `values` does not hold exactly one sample per
    /// voxel.
    pub fn new(bounds: Aabb, voxel_size: f32, values: Vec<f32>) -> Result<Self, SceneError> {
        let dims = Self::grid_dims(&bounds, voxel_size)?;
        let expected = dims.x as usize * dims.y as usize * dims.z as usize;
        if values.len() != expected {
            return Err(SceneError::FieldSizeMismatch {
                expected,
                actual: values.len(),
                dims: dims.to_array(),
            });
        }
        Ok(Self {
            bounds,
            voxel_size,
            dims,
            values,
        })
    }

    /// Samples `distance` at every voxel center.
    ///
    /// # Errors
    ///
    /// Same validation as [`VoxelField::new`] for bounds and voxel size.
    pub fn from_fn(
        bounds: Aabb,
        voxel_size: f32,
        distance: impl Fn(Vec3) -> f32,
    ) -> Result<Self, SceneError> {
        let dims = Self::grid_dims(&bounds, voxel_size)?;
        let mut values = Vec::with_capacity(dims.x as usize * dims.y as usize * dims.z as usize);
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let center = bounds.min + (UVec3::new(x, y, z).as_vec3() + 0.5) * voxel_size;
                    values.push(distance(center));
                }
            }
        }
        Self::new(bounds, voxel_size, values)
    }

    /// Grid resolution: `max(1, round(size / voxel_size))` per axis.
    ///
    /// # Errors
    ///
    /// Rejects non-positive or non-finite voxel sizes and degenerate bounds.
    pub fn grid_dims(bounds: &Aabb, voxel_size: f32) -> Result<UVec3, SceneError> {
        if !voxel_size.is_finite() || voxel_size <= 0.0 {
            return Err(SceneError::InvalidVoxelSize(voxel_size));
        }
        if !bounds.is_valid() {
            return Err(SceneError::DegenerateBounds {
                min: bounds.min.to_array(),
                max: bounds.max.to_array(),
            });
        }
        let cells = (bounds.size() / voxel_size).round().max(Vec3::ONE);
        Ok(cells.as_uvec3())
    }

    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[must_use]
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample at integer grid coordinates, `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        if x >= self.dims.x || y >= self.dims.y || z >= self.dims.z {
            return None;
        }
        let index = ((z * self.dims.y + y) * self.dims.x + x) as usize;
        self.values.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn dims_round_and_never_drop_below_one() {
        let dims = VoxelField::grid_dims(&Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.26, 0.01)), 0.25)
            .unwrap();
        assert_eq!(dims, UVec3::new(4, 1, 1));
    }

    #[test]
    fn rejects_bad_voxel_sizes() {
        for voxel in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                VoxelField::new(unit_bounds(), voxel, vec![0.0]),
                Err(SceneError::InvalidVoxelSize(_))
            ));
        }
    }

    #[test]
    fn rejects_wrong_value_count() {
        let err = VoxelField::new(unit_bounds(), 0.5, vec![0.0; 7]).unwrap_err();
        match err {
            SceneError::FieldSizeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_degenerate_bounds() {
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert!(matches!(
            VoxelField::new(flat, 0.5, vec![0.0; 4]),
            Err(SceneError::DegenerateBounds { .. })
        ));
    }

    #[test]
    fn from_fn_samples_voxel_centers_x_fastest() {
        let field = VoxelField::from_fn(unit_bounds(), 0.5, |p| p.x + 10.0 * p.y + 100.0 * p.z)
            .unwrap();
        assert_eq!(field.dims(), UVec3::splat(2));
        assert_eq!(field.values()[0], 0.25 + 2.5 + 25.0);
        assert_eq!(field.values()[1], 0.75 + 2.5 + 25.0);
        assert_eq!(field.get(0, 1, 0), Some(0.25 + 7.5 + 25.0));
        assert_eq!(field.get(1, 1, 1), Some(0.75 + 7.5 + 75.0));
        assert_eq!(field.get(2, 0, 0), None);
    }
}
