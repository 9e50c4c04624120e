//! View and projection used by the bin and march passes.
//!
//! Projections follow glam's right-handed conventions: the camera looks down
//! `-Z` and NDC depth runs from 0 at the near plane to 1 at the far plane.

use glam::{Mat4, Vec3};

/// Camera reduced to what a frame needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World to view space
    pub view: Mat4,
    /// View to clip space
    pub projection: Mat4,
    /// Near clipping plane distance
    pub znear: f32,
    /// Far clipping plane distance
    pub zfar: f32,
}

impl Camera {
    /// Perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fovy: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fovy, aspect, znear, zfar),
            znear,
            zfar,
        }
    }

    /// Orthographic camera with an identity view.
    ///
    /// `top < bottom` flips the vertical axis, so
    /// `orthographic(0, w, h, 0, ..)` maps world x/y straight to pixels.
    #[must_use]
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, znear: f32, zfar: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::orthographic_rh(left, right, bottom, top, znear, zfar),
            znear,
            zfar,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: Mat4) -> Self {
        self.view = view;
        self
    }

    /// Computes a view projection matrix from the camera parameters
    #[must_use]
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }

    #[must_use]
    pub fn inverse_view_proj(&self) -> Mat4 {
        self.view_proj().inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn pixel_space_orthographic_maps_corners() {
        let camera = Camera::orthographic(0.0, 16.0, 16.0, 0.0, 0.1, 100.0);
        let clip = camera.view_proj() * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert_eq!((clip.x, clip.y), (-1.0, 1.0));
        let clip = camera.view_proj() * Vec4::new(16.0, 16.0, -1.0, 1.0);
        assert_eq!((clip.x, clip.y), (1.0, -1.0));
    }

    #[test]
    fn perspective_inverse_round_trips() {
        let camera = Camera::perspective(
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            1.5,
            0.1,
            100.0,
        );
        let p = Vec4::new(0.3, -0.2, -1.0, 1.0);
        let clip = camera.view_proj() * p;
        let back = camera.inverse_view_proj() * clip;
        assert!((back / back.w - p).abs().max_element() < 1e-4);
    }
}
