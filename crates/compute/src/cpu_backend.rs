use crate::{kernels, BufferView, ComputeBackend, ComputeError, Kernel};

/// Runs the reference kernels on the calling thread.
#[derive(Default, Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn dispatch(
        &self,
        shader: &Kernel,
        binds: &[BufferView],
        _workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError> {
        if binds.iter().any(|view| !view.is_consistent()) {
            return Err(ComputeError::ShapeMismatch(
                "Buffer data length does not match product of shape dimensions and element size",
            ));
        }
        tracing::trace!(kernel = ?shader, bindings = binds.len(), "cpu dispatch");
        match shader {
            Kernel::BinOccupancy => kernels::handle_bin_occupancy(binds),
            Kernel::RayMarch => kernels::handle_ray_march(binds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_shape_fails() {
        let cpu = CpuBackend::new();
        let bad_buf = BufferView::new(vec![0u8; 12].into(), vec![4], 4);
        let uniforms = BufferView::zeroed::<crate::gpu_types::BinUniforms>(1);
        let flags = BufferView::zeroed::<u32>(4);
        let result = cpu.dispatch(&Kernel::BinOccupancy, &[bad_buf, uniforms, flags], [1, 1, 1]);
        assert!(
            matches!(result, Err(ComputeError::ShapeMismatch(_))),
            "Expected ShapeMismatch error, got {result:?}"
        );
    }

    #[test]
    fn too_few_bindings_fail() {
        let cpu = CpuBackend::new();
        let flags = BufferView::zeroed::<u32>(4);
        let result = cpu.dispatch(&Kernel::RayMarch, &[flags], [1, 1, 1]);
        assert!(matches!(result, Err(ComputeError::ShapeMismatch(_))));
    }
}
