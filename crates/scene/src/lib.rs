#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions
)]
//! # Scene
//!
//! Host-side scene data for the tiled SDF renderer.
//!
//! -   [`VoxelField`] is a dense signed-distance grid over an object-space box.
//!     Fields are produced upstream and treated as immutable.
//! -   [`SdfObject`] places a shared field in the world with a transform and a
//!     flat albedo.
//! -   [`SceneBufferAssembler`] flattens every object's field into one buffer
//!     and builds the per-object [`compute::gpu_types::ObjectHeader`] table the
//!     device passes read.
//! -   [`description`] loads JSON scene files and samples analytic shapes into
//!     fields.

pub mod assembler;
pub mod bounds;
pub mod description;
mod error;
pub mod object;
pub mod voxel_field;

pub use assembler::{SceneBufferAssembler, SceneBuffers, SceneCapacity};
pub use bounds::Aabb;
pub use description::SceneDescription;
pub use error::SceneError;
pub use object::SdfObject;
pub use voxel_field::VoxelField;
