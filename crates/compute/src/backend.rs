use crate::{BufferView, ComputeError, Kernel};

pub trait ComputeBackend: Send + Sync + 'static {
    /// Dispatches a kernel with the given bindings and workgroup configuration.
    ///
    /// # Arguments
    /// * `shader`: The kernel to dispatch.
    /// * `binds`: One `BufferView` per binding, in the order given by
    ///   [`crate::layout`]. Writable bindings carry the initial contents of the
    ///   output buffers.
    /// * `workgroups`: The number of workgroups to dispatch. The CPU backend
    ///   ignores it.
    ///
    /// # Returns
    ///
    /// The contents of every writable binding after the kernel finished, in
    /// binding order. This call blocks until the device is idle and the copy to
    /// host memory completed.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::ShapeMismatch` if any buffer is invalid for the
    /// kernel, `ComputeError::Readback` if the device copy fails.
    fn dispatch(
        &self,
        shader: &Kernel,
        binds: &[BufferView],
        workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError>;
}
