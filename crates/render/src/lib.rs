#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions
)]
//! # Render
//!
//! Per-frame tiled ray-march pipeline over a set of [`scene::SdfObject`]s.
//!
//! A frame runs these stages strictly in order:
//!
//! 1.  [`scene::SceneBufferAssembler`] flattens the voxel fields and builds the
//!     object headers.
//! 2.  [`binner::OccupancyBinner`] dispatches the bin pass, which flags every
//!     (object, tile) pair an object's projected bounds may cover.
//! 3.  The flag matrix is read back to the host ([`binner::OccupancyMatrix`]).
//!     This is a blocking device→host transfer.
//! 4.  [`compactor::TileLists`] compacts the matrix into per-tile object lists,
//!     validates them and uploads them.
//! 5.  [`dispatcher::RayMarchDispatcher`] marches every pixel against its tile's
//!     candidates and returns a [`FrameImage`].
//!
//! [`frame::FramePipeline`] wires the stages together.

pub mod binner;
pub mod camera;
pub mod compactor;
pub mod config;
pub mod dispatcher;
mod error;
pub mod frame;
pub mod image_out;
pub mod tile_grid;

pub use camera::Camera;
pub use config::{OverflowPolicy, RenderConfig};
pub use error::RenderError;
pub use frame::{Frame, FramePipeline, FrameStats};
pub use image_out::FrameImage;
pub use tile_grid::TileGrid;
