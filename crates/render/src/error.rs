use compute::ComputeError;
use scene::SceneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("invalid viewport {width}x{height} with {tile_width}x{tile_height} tiles")]
    InvalidViewport {
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    },
    #[error("scene has {objects} objects but at most {max} can be binned")]
    CapacityExceeded { objects: usize, max: usize },
    #[error("readback of {what} returned {actual} bytes, expected {expected}")]
    ReadbackSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("inconsistent tile lists: {0}")]
    TileList(String),
    #[error("invalid render config: {0}")]
    Config(String),
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}
