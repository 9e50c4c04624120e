//! Binding slots shared by the CPU kernels and the WGSL shaders.

// BinOccupancy
pub const BIN_OBJECTS: u32 = 0;
pub const BIN_UNIFORMS: u32 = 1;
pub const BIN_FLAGS_OUT: u32 = 2;

// RayMarch
pub const MARCH_FIELDS: u32 = 0;
pub const MARCH_OBJECTS: u32 = 1;
pub const MARCH_TILE_HEADERS: u32 = 2;
pub const MARCH_TILE_INDICES: u32 = 3;
pub const MARCH_UNIFORMS: u32 = 4;
pub const MARCH_COLOR_OUT: u32 = 5;
pub const MARCH_DEPTH_OUT: u32 = 6;

const _: () = assert!(BIN_FLAGS_OUT == 2);
const _: () = assert!(MARCH_DEPTH_OUT == 6);

/// Workgroup sizes declared by the shaders.
pub const BIN_WORKGROUP_SIZE: u32 = 64;
pub const MARCH_WORKGROUP_SIZE: [u32; 2] = [8, 8];

/// Return expected number of bindings for each kernel.
#[must_use]
pub const fn binding_count(kernel: &crate::Kernel) -> u32 {
    match kernel {
        crate::Kernel::BinOccupancy => 3,
        crate::Kernel::RayMarch => 7,
    }
}

/// Whether the kernel writes the binding (and it is therefore read back).
#[must_use]
pub const fn is_output(kernel: &crate::Kernel, binding: u32) -> bool {
    match kernel {
        crate::Kernel::BinOccupancy => binding == BIN_FLAGS_OUT,
        crate::Kernel::RayMarch => binding == MARCH_COLOR_OUT || binding == MARCH_DEPTH_OUT,
    }
}

/// Whether the binding is a uniform block rather than a storage buffer.
#[must_use]
pub const fn is_uniform(kernel: &crate::Kernel, binding: u32) -> bool {
    match kernel {
        crate::Kernel::BinOccupancy => binding == BIN_UNIFORMS,
        crate::Kernel::RayMarch => binding == MARCH_UNIFORMS,
    }
}

/// Workgroup count for a bin pass over `objects` objects.
#[must_use]
pub const fn bin_workgroups(objects: u32) -> [u32; 3] {
    let groups = objects.div_ceil(BIN_WORKGROUP_SIZE);
    [if groups == 0 { 1 } else { groups }, 1, 1]
}

/// Workgroup count for a ray-march pass over a `width × height` image.
#[must_use]
pub const fn march_workgroups(width: u32, height: u32) -> [u32; 3] {
    [
        width.div_ceil(MARCH_WORKGROUP_SIZE[0]),
        height.div_ceil(MARCH_WORKGROUP_SIZE[1]),
        1,
    ]
}
