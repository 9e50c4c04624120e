#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions
)]
//! # Compute
//!
//! Thin abstraction over the device that runs the tiled SDF passes.
//!
//! Host code packs its data into [`BufferView`]s, picks a [`Kernel`] and calls
//! [`ComputeBackend::dispatch`]. The call is synchronous: when it returns, the
//! buffers the kernel wrote have been copied back to host memory. That return
//! value is the only device→host transfer in a frame.
//!
//! Two backends exist:
//!
//! -   [`CpuBackend`] runs the reference kernels in [`kernels`] on the host. It is
//!     always available and is what the tests run against.
//! -   `WgpuBackend` (feature `gpu`) compiles the WGSL shaders under `shaders/`
//!     and runs them on the system's graphics device.

use std::sync::Arc;
use thiserror::Error;

mod backend;
mod cpu_backend;
pub mod gpu_types;
pub mod kernels;
pub mod layout;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use backend::ComputeBackend;
pub use cpu_backend::CpuBackend;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    #[error("backend not available")]
    BackendUnavailable,
    #[error("device readback failed: {0}")]
    Readback(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Marks which screen tiles each object's bounds may cover.
    BinOccupancy,
    /// Sphere-traces the candidate objects of every pixel's tile.
    RayMarch,
}

impl Kernel {
    #[must_use]
    pub const fn binding_count(&self) -> u32 {
        layout::binding_count(self)
    }
}

#[derive(Clone, Debug)]
pub struct BufferView {
    pub data: Arc<[u8]>,
    pub shape: Vec<usize>, // Number of elements per dimension
    pub element_size_in_bytes: usize,
}

impl BufferView {
    #[must_use]
    pub fn new(data: Arc<[u8]>, shape: Vec<usize>, element_size_in_bytes: usize) -> Self {
        Self {
            data,
            shape,
            element_size_in_bytes,
        }
    }

    /// One-dimensional view over a slice of plain-old-data elements.
    #[must_use]
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::new(
            bytemuck::cast_slice(values).to_vec().into(),
            vec![values.len()],
            std::mem::size_of::<T>(),
        )
    }

    /// View over a single uniform value.
    #[must_use]
    pub fn from_value<T: bytemuck::Pod>(value: &T) -> Self {
        Self::new(
            bytemuck::bytes_of(value).to_vec().into(),
            vec![1],
            std::mem::size_of::<T>(),
        )
    }

    /// Zero-filled view holding `len` elements of `T`.
    #[must_use]
    pub fn zeroed<T: bytemuck::Pod>(len: usize) -> Self {
        Self::new(
            vec![0u8; len * std::mem::size_of::<T>()].into(),
            vec![len],
            std::mem::size_of::<T>(),
        )
    }

    /// Number of elements described by `shape`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when the byte length agrees with `shape` and the element size.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.len() * self.element_size_in_bytes
    }
}

/// Returns a compute backend, preferring the GPU when asked and available.
///
/// With the `gpu` feature enabled and `prefer_gpu` set this attempts to create a
/// [`WgpuBackend`]. If that fails, or the feature is off, a [`CpuBackend`] is
/// returned.
#[must_use]
pub fn default_backend(prefer_gpu: bool) -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "gpu")]
    {
        if prefer_gpu {
            match WgpuBackend::new() {
                Ok(gpu) => {
                    tracing::info!("Using wgpu backend.");
                    return Arc::new(gpu);
                }
                Err(err) => {
                    tracing::warn!("wgpu backend initialization failed ({err}), falling back...");
                }
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    {
        if prefer_gpu {
            tracing::warn!("Built without the `gpu` feature; using the CPU backend.");
        }
    }

    tracing::info!("Using CPU backend.");
    Arc::new(CpuBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_records_shape_and_element_size() {
        let view = BufferView::from_slice(&[1.0f32, 2.0, 3.0]);
        assert_eq!(view.shape, vec![3]);
        assert_eq!(view.element_size_in_bytes, 4);
        assert_eq!(view.data.len(), 12);
        assert!(view.is_consistent());
    }

    #[test]
    fn zeroed_view_is_all_zero() {
        let view = BufferView::zeroed::<u32>(5);
        assert_eq!(view.len(), 5);
        assert!(view.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn inconsistent_view_is_detected() {
        let view = BufferView::new(vec![0u8; 12].into(), vec![4], 4);
        assert!(!view.is_consistent());
    }

    #[test]
    fn cpu_backend_is_the_fallback() {
        let backend = default_backend(false);
        let result = backend.dispatch(&Kernel::BinOccupancy, &[], [1, 1, 1]);
        assert!(matches!(result, Err(ComputeError::ShapeMismatch(_))));
    }
}
