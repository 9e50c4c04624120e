use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("voxel size must be finite and positive, got {0}")]
    InvalidVoxelSize(f32),
    #[error("field bounds are degenerate: min {min:?}, max {max:?}")]
    DegenerateBounds { min: [f32; 3], max: [f32; 3] },
    #[error("field has {actual} values but its {dims:?} grid needs {expected}")]
    FieldSizeMismatch {
        expected: usize,
        actual: usize,
        dims: [u32; 3],
    },
    #[error("scene holds {0} field entries, more than a u32 offset can address")]
    TooManyEntries(usize),
    #[error("object {0} has a singular world transform")]
    SingularTransform(usize),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),
}
