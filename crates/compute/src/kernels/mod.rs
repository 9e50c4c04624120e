// This module holds the CPU reference implementation of each kernel.

use crate::{BufferView, ComputeError};
use std::borrow::Cow;

pub mod bin_occupancy_op;
pub use bin_occupancy_op::handle_bin_occupancy;
pub mod ray_march_op;
pub use ray_march_op::handle_ray_march;

/// Views `view` as a slice of `T`, copying only when the bytes are misaligned.
pub(crate) fn read_slice<'a, T: bytemuck::Pod>(
    view: &'a BufferView,
    what: &'static str,
) -> Result<Cow<'a, [T]>, ComputeError> {
    if view.element_size_in_bytes != std::mem::size_of::<T>() {
        return Err(ComputeError::ShapeMismatch(what));
    }
    match bytemuck::try_cast_slice::<u8, T>(&view.data) {
        Ok(values) => Ok(Cow::Borrowed(values)),
        Err(bytemuck::PodCastError::TargetAlignmentGreaterAndInputNotAligned) => Ok(Cow::Owned(
            view.data
                .chunks_exact(std::mem::size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )),
        Err(_) => Err(ComputeError::ShapeMismatch(what)),
    }
}

/// Reads the single value held by a uniform view.
pub(crate) fn read_value<T: bytemuck::Pod>(
    view: &BufferView,
    what: &'static str,
) -> Result<T, ComputeError> {
    if view.data.len() != std::mem::size_of::<T>() {
        return Err(ComputeError::ShapeMismatch(what));
    }
    Ok(bytemuck::pod_read_unaligned(&view.data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_slice_rejects_wrong_element_size() {
        let view = BufferView::from_slice(&[1u32, 2, 3]);
        let result = read_slice::<[f32; 4]>(&view, "colors");
        assert!(matches!(result, Err(ComputeError::ShapeMismatch("colors"))));
    }

    #[test]
    fn read_slice_returns_typed_values() {
        let view = BufferView::from_slice(&[7u32, 9]);
        let values = read_slice::<u32>(&view, "values").expect("readable");
        assert_eq!(&*values, &[7, 9]);
    }

    #[test]
    fn read_value_checks_size() {
        let view = BufferView::from_slice(&[1u32, 2]);
        assert!(read_value::<u32>(&view, "scalar").is_err());
        assert_eq!(read_value::<[u32; 2]>(&view, "pair").unwrap(), [1, 2]);
    }
}
