//! JSON scene files.
//!
//! ```json
//! {
//!   "objects": [
//!     { "shape": "sphere", "radius": 0.75, "position": [0, 0, -5], "albedo": [1, 0, 0, 1] },
//!     { "shape": "box", "half_extents": [0.5, 0.5, 0.5], "rotation": [0, 0.383, 0, 0.924] },
//!     { "shape": "grid", "min": [-1, -1, -1], "max": [1, 1, 1], "voxel_size": 1.0, "values": [..] }
//!   ]
//! }
//! ```
//!
//! Analytic shapes are sampled into dense fields padded by two voxels on every
//! side so the surface never touches the field border.

use crate::{Aabb, SceneError, SdfObject, VoxelField};
use glam::{Mat4, Quat, Vec3, Vec4};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Voxels of empty space around an analytic shape.
pub const SHAPE_PADDING_VOXELS: f32 = 2.0;

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescription {
    pub objects: Vec<ObjectDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDescription {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default = "default_voxel_size")]
    pub voxel_size: f32,
    #[serde(default)]
    pub position: [f32; 3],
    /// Quaternion, `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default = "white")]
    pub albedo: [f32; 4],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "shape")]
pub enum Shape {
    #[serde(rename = "sphere")]
    Sphere { radius: f32 },
    #[serde(rename = "box")]
    Box { half_extents: [f32; 3] },
    /// Pre-baked samples over `[min, max]`, x fastest.
    #[serde(rename = "grid")]
    Grid {
        min: [f32; 3],
        max: [f32; 3],
        values: Vec<f32>,
    },
}

fn default_voxel_size() -> f32 {
    0.1
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn white() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

impl FromStr for SceneDescription {
    type Err = SceneError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SceneDescription {
    /// Reads and parses a scene file.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors are returned as `SceneError::Io` / `SceneError::Json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let json = std::fs::read_to_string(path)?;
        json.parse()
    }

    /// Samples every shape and builds the scene objects in file order.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidShape` for non-positive shape sizes or a
    /// zero rotation, and any field validation error.
    pub fn into_objects(self) -> Result<Vec<SdfObject>, SceneError> {
        self.objects
            .into_iter()
            .enumerate()
            .map(|(i, object)| {
                let built = object.build();
                if let Err(err) = &built {
                    tracing::warn!(object = i, "failed to build scene object: {err}");
                }
                built
            })
            .collect()
    }
}

impl ObjectDescription {
    /// Samples the shape into a field and places it in the world.
    ///
    /// # Errors
    ///
    /// See [`SceneDescription::into_objects`].
    pub fn build(self) -> Result<SdfObject, SceneError> {
        let transform = self.world_transform()?;
        let field = self.shape.sample(self.voxel_size)?;
        Ok(SdfObject::new(Arc::new(field), transform).with_albedo(Vec4::from_array(self.albedo)))
    }

    fn world_transform(&self) -> Result<Mat4, SceneError> {
        let rotation = Quat::from_array(self.rotation);
        if !rotation.is_finite() || rotation.length_squared() <= f32::EPSILON {
            return Err(SceneError::InvalidShape(format!(
                "rotation {:?} is not a usable quaternion",
                self.rotation
            )));
        }
        Ok(Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            rotation.normalize(),
            Vec3::from_array(self.position),
        ))
    }
}

impl Shape {
    /// Dense field of this shape, centered on the object-space origin.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidShape` for non-positive sizes and any
    /// [`VoxelField`] validation error.
    pub fn sample(self, voxel_size: f32) -> Result<VoxelField, SceneError> {
        let padding = Vec3::splat(SHAPE_PADDING_VOXELS * voxel_size);
        match self {
            Shape::Sphere { radius } => {
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(SceneError::InvalidShape(format!("sphere radius {radius}")));
                }
                let bounds =
                    Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(radius) + padding);
                VoxelField::from_fn(bounds, voxel_size, |p| p.length() - radius)
            }
            Shape::Box { half_extents } => {
                let half = Vec3::from_array(half_extents);
                if !(half.is_finite() && half.cmpgt(Vec3::ZERO).all()) {
                    return Err(SceneError::InvalidShape(format!(
                        "box half extents {half_extents:?}"
                    )));
                }
                let bounds = Aabb::from_center_half_extents(Vec3::ZERO, half + padding);
                VoxelField::from_fn(bounds, voxel_size, |p| box_distance(p, half))
            }
            Shape::Grid { min, max, values } => VoxelField::new(
                Aabb::new(Vec3::from_array(min), Vec3::from_array(max)),
                voxel_size,
                values,
            ),
        }
    }
}

fn box_distance(p: Vec3, half: Vec3) -> f32 {
    let q = p.abs() - half;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_shapes_with_defaults() {
        let json = r#"{
            "objects": [
                { "shape": "sphere", "radius": 0.5, "position": [1, 2, 3] },
                { "shape": "box", "half_extents": [0.5, 0.25, 0.5], "voxel_size": 0.05 },
                { "shape": "grid", "min": [0, 0, 0], "max": [1, 1, 1], "voxel_size": 1.0, "values": [0.5] }
            ]
        }"#;
        let scene: SceneDescription = json.parse().unwrap();
        assert_eq!(scene.objects.len(), 3);
        assert!(matches!(scene.objects[0].shape, Shape::Sphere { radius } if radius == 0.5));
        assert_eq!(scene.objects[0].voxel_size, 0.1);
        assert_eq!(scene.objects[0].rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(scene.objects[1].albedo, [1.0; 4]);

        let objects = scene.into_objects().unwrap();
        assert_eq!(objects.len(), 3);
        assert_eq!(
            objects[0].world_transform.w_axis.truncate(),
            Vec3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(objects[2].field.values(), &[0.5]);
    }

    #[test]
    fn sphere_field_is_padded_and_signed() {
        let field = Shape::Sphere { radius: 0.5 }.sample(0.1).unwrap();
        // 0.5 radius plus two voxels of padding on each side
        assert_eq!(field.dims(), glam::UVec3::splat(14));
        let corner = field.get(0, 0, 0).unwrap();
        assert!(corner > 0.0);
        let center = field.get(7, 7, 7).unwrap();
        assert!(center < 0.0);
    }

    #[test]
    fn box_distance_is_exact_on_axes() {
        let half = Vec3::new(1.0, 0.5, 0.25);
        assert!((box_distance(Vec3::new(2.0, 0.0, 0.0), half) - 1.0).abs() < 1e-6);
        assert!((box_distance(Vec3::ZERO, half) + 0.25).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            Shape::Sphere { radius: 0.0 }.sample(0.1),
            Err(SceneError::InvalidShape(_))
        ));
        let json = r#"{ "objects": [ { "shape": "sphere", "radius": 1.0, "rotation": [0, 0, 0, 0] } ] }"#;
        let scene: SceneDescription = json.parse().unwrap();
        assert!(matches!(scene.into_objects(), Err(SceneError::InvalidShape(_))));
    }

    #[test]
    fn grid_with_wrong_sample_count_fails() {
        let json = r#"{ "objects": [ { "shape": "grid", "min": [0, 0, 0], "max": [2, 2, 2], "voxel_size": 1.0, "values": [0.0] } ] }"#;
        let scene: SceneDescription = json.parse().unwrap();
        assert!(matches!(
            scene.into_objects(),
            Err(SceneError::FieldSizeMismatch { expected: 8, .. })
        ));
    }

    #[test]
    fn unknown_shape_is_a_json_error() {
        let result = r#"{ "objects": [ { "shape": "torus" } ] }"#.parse::<SceneDescription>();
        assert!(matches!(result, Err(SceneError::Json(_))));
    }
}
