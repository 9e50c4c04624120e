//! Frame color and depth, and PNG export.

use crate::RenderError;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::path::Path;

/// Color and depth for every pixel of the viewport, row-major from the
/// top-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub color: Vec<[f32; 4]>,
    /// Distance along the view ray from the near plane; `far` for background.
    pub depth: Vec<f32>,
}

impl FrameImage {
    /// Every pixel set to `clear_color` at depth `far`.
    #[must_use]
    pub fn background(width: u32, height: u32, clear_color: [f32; 4], far: f32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![clear_color; pixels],
            depth: vec![far; pixels],
        }
    }

    /// Decodes the two buffers written by the march pass.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::ReadbackSize` if either buffer has the wrong
    /// length.
    pub fn from_readback(
        width: u32,
        height: u32,
        color: &[u8],
        depth: &[u8],
    ) -> Result<Self, RenderError> {
        let pixels = width as usize * height as usize;
        let color_bytes = pixels * std::mem::size_of::<[f32; 4]>();
        if color.len() != color_bytes {
            return Err(RenderError::ReadbackSize {
                what: "color",
                expected: color_bytes,
                actual: color.len(),
            });
        }
        let depth_bytes = pixels * std::mem::size_of::<f32>();
        if depth.len() != depth_bytes {
            return Err(RenderError::ReadbackSize {
                what: "depth",
                expected: depth_bytes,
                actual: depth.len(),
            });
        }
        Ok(Self {
            width,
            height,
            color: color
                .chunks_exact(std::mem::size_of::<[f32; 4]>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
            depth: depth
                .chunks_exact(std::mem::size_of::<f32>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        })
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    #[must_use]
    pub fn color_at(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        self.index(x, y).map(|i| self.color[i])
    }

    #[must_use]
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|i| self.depth[i])
    }

    /// 8-bit RGBA copy, channels clamped to `[0, 1]`.
    #[must_use]
    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.color[(y * self.width + x) as usize];
            Rgba(c.map(unit_to_u8))
        })
    }

    /// Grayscale depth, white at the near plane and black at `far`.
    #[must_use]
    pub fn depth_to_luma8(&self, far: f32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let d = self.depth[(y * self.width + x) as usize];
            Luma([unit_to_u8(1.0 - d / far)])
        })
    }

    /// # Errors
    ///
    /// Returns `RenderError::Image` if encoding or writing fails.
    pub fn save_color_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.to_rgba8()
            .save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        tracing::info!("wrote color image to {}", path.as_ref().display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RenderError::Image` if encoding or writing fails.
    pub fn save_depth_png(&self, path: impl AsRef<Path>, far: f32) -> Result<(), RenderError> {
        self.depth_to_luma8(far)
            .save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        tracing::info!("wrote depth image to {}", path.as_ref().display());
        Ok(())
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_length_is_checked() {
        let color = vec![0u8; 2 * 2 * 16];
        let depth = vec![0u8; 3 * 4];
        assert!(matches!(
            FrameImage::from_readback(2, 2, &color, &depth),
            Err(RenderError::ReadbackSize { what: "depth", .. })
        ));
    }

    #[test]
    fn rgba8_clamps_channels() {
        let mut frame = FrameImage::background(2, 1, [0.0, 0.5, 2.0, 1.0], 10.0);
        frame.color[1] = [-1.0, 1.0, 0.0, 1.0];
        let image = frame.to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [0, 128, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn depth_maps_far_to_black() {
        let mut frame = FrameImage::background(2, 1, [0.0; 4], 10.0);
        frame.depth[0] = 0.0;
        let luma = frame.depth_to_luma8(10.0);
        assert_eq!(luma.get_pixel(0, 0).0, [255]);
        assert_eq!(luma.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let frame = FrameImage::background(3, 2, [1.0; 4], 5.0);
        assert_eq!(frame.depth_at(2, 1), Some(5.0));
        assert_eq!(frame.color_at(3, 0), None);
    }

    #[test]
    fn saves_png_files() {
        let dir = std::env::temp_dir().join(format!("render-image-out-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let frame = FrameImage::background(4, 4, [0.2, 0.4, 0.6, 1.0], 10.0);
        frame.save_color_png(dir.join("color.png")).unwrap();
        frame.save_depth_png(dir.join("depth.png"), 10.0).unwrap();
        assert!(dir.join("color.png").exists());
        assert!(dir.join("depth.png").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
