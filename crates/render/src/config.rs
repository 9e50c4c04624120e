//! Render configuration, loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "viewport": { "width": 640, "height": 480 },
//!   "tile_size": { "width": 16, "height": 16 },
//!   "max_objects": 64,
//!   "clear_color": [0.0, 0.0, 0.0, 1.0],
//!   "overflow": "drop",
//!   "march": { "max_steps": 128, "hit_epsilon": 0.001, "min_step": 0.001 },
//!   "camera": { "projection": "perspective", "eye": [0, 0, 3], "target": [0, 0, 0],
//!               "fovy_degrees": 45.0, "znear": 0.1, "zfar": 100.0 }
//! }
//! ```

use crate::{Camera, RenderError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// What to do with objects beyond `max_objects`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Skip objects with `id >= max_objects`, log a warning and count them in
    /// [`crate::FrameStats::dropped_objects`].
    #[default]
    Drop,
    /// Abort the frame with [`RenderError::CapacityExceeded`].
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchConfig {
    pub max_steps: u32,
    /// Distance below which a sample counts as a surface hit.
    pub hit_epsilon: f32,
    /// Smallest step taken along the ray, in object space.
    pub min_step: f32,
}

impl Default for MarchConfig {
    fn default() -> Self {
        Self {
            max_steps: 128,
            hit_epsilon: 1e-3,
            min_step: 1e-3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "projection", rename_all = "snake_case")]
pub enum CameraConfig {
    Perspective {
        eye: [f32; 3],
        target: [f32; 3],
        #[serde(default = "up_y")]
        up: [f32; 3],
        fovy_degrees: f32,
        znear: f32,
        zfar: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        znear: f32,
        zfar: f32,
    },
}

fn up_y() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig::Perspective {
            eye: [0.0, 0.0, 3.0],
            target: [0.0, 0.0, 0.0],
            up: up_y(),
            fovy_degrees: 45.0,
            znear: 0.1,
            zfar: 100.0,
        }
    }
}

impl CameraConfig {
    /// Builds the camera for a viewport of the given aspect ratio.
    #[must_use]
    pub fn camera(&self, aspect: f32) -> Camera {
        match *self {
            CameraConfig::Perspective {
                eye,
                target,
                up,
                fovy_degrees,
                znear,
                zfar,
            } => Camera::perspective(
                Vec3::from_array(eye),
                Vec3::from_array(target),
                Vec3::from_array(up),
                fovy_degrees.to_radians(),
                aspect,
                znear,
                zfar,
            ),
            CameraConfig::Orthographic {
                left,
                right,
                bottom,
                top,
                znear,
                zfar,
            } => Camera::orthographic(left, right, bottom, top, znear, zfar),
        }
    }

    fn planes(&self) -> (f32, f32) {
        match *self {
            CameraConfig::Perspective { znear, zfar, .. }
            | CameraConfig::Orthographic { znear, zfar, .. } => (znear, zfar),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub viewport: Extent,
    pub tile_size: Extent,
    /// Rows of the occupancy matrix; objects past it are never binned.
    pub max_objects: u32,
    pub clear_color: [f32; 4],
    pub overflow: OverflowPolicy,
    pub march: MarchConfig,
    pub camera: CameraConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport: Extent {
                width: 640,
                height: 480,
            },
            tile_size: Extent {
                width: 16,
                height: 16,
            },
            max_objects: 64,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            overflow: OverflowPolicy::Drop,
            march: MarchConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl FromStr for RenderConfig {
    type Err = RenderError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RenderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl RenderConfig {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Config` if the file cannot be read or parsed, or
    /// fails [`RenderConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("{}: {e}", path.display())))?;
        json.parse()
    }

    /// # Errors
    ///
    /// Returns `RenderError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(RenderError::Config("viewport must be non-empty".into()));
        }
        if self.tile_size.width == 0 || self.tile_size.height == 0 {
            return Err(RenderError::Config("tile_size must be non-zero".into()));
        }
        if self.max_objects == 0 {
            return Err(RenderError::Config("max_objects must be at least 1".into()));
        }
        if self.march.max_steps == 0 {
            return Err(RenderError::Config("march.max_steps must be at least 1".into()));
        }
        if !(self.march.hit_epsilon > 0.0 && self.march.min_step > 0.0) {
            return Err(RenderError::Config(
                "march.hit_epsilon and march.min_step must be positive".into(),
            ));
        }
        let (znear, zfar) = self.camera.planes();
        if !(znear > 0.0 && zfar > znear) {
            return Err(RenderError::Config(format!(
                "camera planes must satisfy 0 < znear < zfar, got {znear} and {zfar}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.viewport.width as f32 / self.viewport.height as f32
    }

    /// Camera described by the configuration, sized to the viewport.
    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera.camera(self.aspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: RenderConfig = "{}".parse().unwrap();
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config: RenderConfig = r#"{
            "viewport": { "width": 16, "height": 16 },
            "tile_size": { "width": 8, "height": 8 },
            "overflow": "error",
            "march": { "max_steps": 32 },
            "camera": { "projection": "orthographic", "left": 0, "right": 16,
                        "bottom": 16, "top": 0, "znear": 0.1, "zfar": 100 }
        }"#
        .parse()
        .unwrap();
        assert_eq!(config.overflow, OverflowPolicy::Error);
        assert_eq!(config.march.max_steps, 32);
        assert_eq!(config.march.hit_epsilon, 1e-3);
        assert_eq!(config.max_objects, 64);
        assert_eq!(config.camera().zfar, 100.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for json in [
            r#"{ "viewport": { "width": 0, "height": 4 } }"#,
            r#"{ "tile_size": { "width": 8, "height": 0 } }"#,
            r#"{ "max_objects": 0 }"#,
            r#"{ "march": { "min_step": 0.0 } }"#,
            r#"{ "overflow": "grow" }"#,
        ] {
            assert!(
                matches!(json.parse::<RenderConfig>(), Err(RenderError::Config(_))),
                "{json} should be rejected"
            );
        }
    }
}
