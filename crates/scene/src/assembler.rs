//! Scene Buffer Assembler.
//!
//! Flattens every object's voxel field into one `f32` buffer, in object order,
//! and builds the [`ObjectHeader`] table that points into it. Headers are
//! rebuilt on every call; the flattened buffer is only re-copied when the set
//! of fields changes.
//!
//! Backing storage is sized by a [`SceneCapacity`]. Growing the scene past it
//! reallocates instead of overrunning the previous allocation.

use crate::{SceneError, SdfObject, VoxelField};
use compute::gpu_types::ObjectHeader;
use compute::BufferView;
use std::sync::Arc;

/// Storage reserved by the assembler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneCapacity {
    pub objects: usize,
    pub field_entries: usize,
}

impl SceneCapacity {
    #[must_use]
    pub fn fits(&self, objects: usize, field_entries: usize) -> bool {
        objects <= self.objects && field_entries <= self.field_entries
    }
}

/// Device-ready views produced by [`SceneBufferAssembler::assemble`].
#[derive(Clone, Debug)]
pub struct SceneBuffers {
    /// Flattened `f32` field samples of every object.
    pub fields: BufferView,
    /// One [`ObjectHeader`] per object, indexed by object id.
    pub headers: BufferView,
    pub object_count: u32,
    pub field_entries: usize,
    /// Backing storage grew during this call.
    pub reallocated: bool,
    /// The flattened buffer was re-copied during this call.
    pub fields_rebuilt: bool,
}

pub struct SceneBufferAssembler {
    capacity: SceneCapacity,
    fields: Vec<f32>,
    headers: Vec<ObjectHeader>,
    /// Fields currently laid out in `fields`, in object order.
    resident: Vec<Arc<VoxelField>>,
    field_view: BufferView,
}

impl Default for SceneBufferAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBufferAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: SceneCapacity::default(),
            fields: Vec::new(),
            headers: Vec::new(),
            resident: Vec::new(),
            field_view: BufferView::from_slice::<f32>(&[]),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> SceneCapacity {
        self.capacity
    }

    /// Makes room for `objects` headers and `field_entries` samples.
    ///
    /// Returns `true` if the backing storage had to be reallocated. Calling it
    /// again with the same or smaller numbers is a no-op.
    pub fn ensure_capacity(&mut self, objects: usize, field_entries: usize) -> bool {
        if self.capacity.fits(objects, field_entries) {
            return false;
        }
        let grown = SceneCapacity {
            objects: objects.max(self.capacity.objects),
            field_entries: field_entries.max(self.capacity.field_entries),
        };
        tracing::debug!(
            from = ?self.capacity,
            to = ?grown,
            "reallocating scene buffers"
        );
        self.fields = vec![0.0; grown.field_entries];
        self.headers = Vec::with_capacity(grown.objects);
        // The old layout is gone with the old allocation.
        self.resident.clear();
        self.capacity = grown;
        true
    }

    fn is_resident(&self, objects: &[SdfObject]) -> bool {
        self.resident.len() == objects.len()
            && self
                .resident
                .iter()
                .zip(objects)
                .all(|(field, object)| {
                    Arc::ptr_eq(field, &object.field) && field.len() == object.field.len()
                })
    }

    /// Packs `objects` into the flattened field buffer and header table.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::TooManyEntries` if offsets no longer fit in a
    /// `u32`, and `SceneError::SingularTransform` for an object whose world
    /// transform cannot be inverted.
    pub fn assemble(&mut self, objects: &[SdfObject]) -> Result<SceneBuffers, SceneError> {
        let total: usize = objects.iter().map(|o| o.field.len()).sum();
        if u32::try_from(total).is_err() || u32::try_from(objects.len()).is_err() {
            return Err(SceneError::TooManyEntries(total));
        }

        let reallocated = self.ensure_capacity(objects.len(), total);
        let fields_rebuilt = !self.is_resident(objects);
        if fields_rebuilt {
            let mut offset = 0;
            for object in objects {
                let values = object.field.values();
                self.fields[offset..offset + values.len()].copy_from_slice(values);
                offset += values.len();
            }
            self.resident = objects.iter().map(|o| Arc::clone(&o.field)).collect();
            self.field_view = BufferView::from_slice(&self.fields[..total]);
            tracing::debug!(
                objects = objects.len(),
                entries = total,
                "rebuilt flattened field buffer"
            );
        }

        self.headers.clear();
        let mut start_offset = 0u32;
        for (object_id, object) in objects.iter().enumerate() {
            let header = build_header(object_id, object, start_offset)?;
            start_offset += header.num_entries;
            self.headers.push(header);
        }

        Ok(SceneBuffers {
            fields: self.field_view.clone(),
            headers: BufferView::from_slice(&self.headers),
            object_count: objects.len() as u32,
            field_entries: total,
            reallocated,
            fields_rebuilt,
        })
    }

    /// Header table of the last [`assemble`](Self::assemble) call.
    #[must_use]
    pub fn headers(&self) -> &[ObjectHeader] {
        &self.headers
    }
}

fn build_header(
    object_id: usize,
    object: &SdfObject,
    start_offset: u32,
) -> Result<ObjectHeader, SceneError> {
    let determinant = object.world_transform.determinant();
    if !determinant.is_normal() {
        return Err(SceneError::SingularTransform(object_id));
    }
    let field = &object.field;
    let bounds = field.bounds();
    let half = bounds.size() * 0.5;
    let local_min = bounds.center() - half;
    let local_max = bounds.center() + half;
    let world = bounds.transformed(&object.world_transform);

    Ok(ObjectHeader {
        world_to_object: object.world_transform.inverse().to_cols_array_2d(),
        object_to_world: object.world_transform.to_cols_array_2d(),
        local_min: local_min.extend(0.0).to_array(),
        local_max: local_max.extend(0.0).to_array(),
        world_min: world.min.extend(0.0).to_array(),
        world_max: world.max.extend(0.0).to_array(),
        albedo: object.albedo.to_array(),
        dims: field.dims().extend(0).to_array(),
        start_offset,
        num_entries: field.len() as u32,
        voxel_size: field.voxel_size(),
        object_id: object_id as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Aabb;
    use glam::{Mat4, Vec3};

    fn field(size: f32, voxel: f32) -> Arc<VoxelField> {
        let bounds = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(size * 0.5));
        Arc::new(VoxelField::from_fn(bounds, voxel, |p| p.length() - size * 0.25).unwrap())
    }

    #[test]
    fn offsets_are_contiguous() {
        let objects = vec![
            SdfObject::new(field(1.0, 0.5), Mat4::IDENTITY),
            SdfObject::new(field(1.0, 0.25), Mat4::from_translation(Vec3::X)),
            SdfObject::new(field(2.0, 1.0), Mat4::IDENTITY),
        ];
        let mut assembler = SceneBufferAssembler::new();
        let buffers = assembler.assemble(&objects).unwrap();
        let headers = assembler.headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].start_offset, 0);
        for pair in headers.windows(2) {
            assert_eq!(pair[1].start_offset, pair[0].start_offset + pair[0].num_entries);
        }
        let total: u32 = headers.iter().map(|h| h.num_entries).sum();
        assert_eq!(total as usize, buffers.field_entries);
        assert_eq!(buffers.fields.len(), buffers.field_entries);
        assert_eq!(buffers.object_count, 3);
        for (id, header) in headers.iter().enumerate() {
            assert_eq!(header.object_id as usize, id);
        }
    }

    #[test]
    fn flattened_buffer_holds_each_field_at_its_offset() {
        let a = field(1.0, 0.5);
        let b = field(1.0, 0.25);
        let objects = vec![
            SdfObject::new(Arc::clone(&a), Mat4::IDENTITY),
            SdfObject::new(Arc::clone(&b), Mat4::IDENTITY),
        ];
        let mut assembler = SceneBufferAssembler::new();
        let buffers = assembler.assemble(&objects).unwrap();
        let flat: &[f32] = bytemuck::cast_slice(&buffers.fields.data);
        assert_eq!(&flat[..a.len()], a.values());
        assert_eq!(&flat[a.len()..], b.values());
    }

    #[test]
    fn world_extents_follow_the_transform() {
        let objects = vec![SdfObject::new(
            field(2.0, 0.5),
            Mat4::from_translation(Vec3::new(3.0, 0.0, -2.0)),
        )];
        let mut assembler = SceneBufferAssembler::new();
        assembler.assemble(&objects).unwrap();
        let header = assembler.headers()[0];
        assert_eq!(header.local_min, [-1.0, -1.0, -1.0, 0.0]);
        assert_eq!(header.local_max, [1.0, 1.0, 1.0, 0.0]);
        assert_eq!(header.world_min, [2.0, -1.0, -3.0, 0.0]);
        assert_eq!(header.world_max, [4.0, 1.0, -1.0, 0.0]);
        assert_eq!(header.dims, [4, 4, 4, 0]);
    }

    #[test]
    fn ensure_capacity_is_idempotent() {
        let mut assembler = SceneBufferAssembler::new();
        assert!(assembler.ensure_capacity(4, 100));
        assert!(!assembler.ensure_capacity(4, 100));
        assert!(!assembler.ensure_capacity(2, 50));
        assert!(assembler.ensure_capacity(5, 100));
        assert_eq!(
            assembler.capacity(),
            SceneCapacity {
                objects: 5,
                field_entries: 100
            }
        );
    }

    #[test]
    fn unchanged_scene_reuses_the_field_buffer() {
        let objects = vec![SdfObject::new(field(1.0, 0.5), Mat4::IDENTITY)];
        let mut assembler = SceneBufferAssembler::new();
        let first = assembler.assemble(&objects).unwrap();
        assert!(first.reallocated);
        assert!(first.fields_rebuilt);

        let moved = vec![SdfObject::new(
            Arc::clone(&objects[0].field),
            Mat4::from_translation(Vec3::Y),
        )];
        let second = assembler.assemble(&moved).unwrap();
        assert!(!second.reallocated);
        assert!(!second.fields_rebuilt);
        assert!(Arc::ptr_eq(&first.fields.data, &second.fields.data));
        assert_eq!(assembler.headers()[0].world_min[1], 0.5);
    }

    #[test]
    fn growing_scene_reallocates_and_rebuilds() {
        let mut assembler = SceneBufferAssembler::new();
        let one = vec![SdfObject::new(field(1.0, 0.5), Mat4::IDENTITY)];
        assembler.assemble(&one).unwrap();

        let two = vec![
            one[0].clone(),
            SdfObject::new(field(1.0, 0.25), Mat4::IDENTITY),
        ];
        let buffers = assembler.assemble(&two).unwrap();
        assert!(buffers.reallocated);
        assert!(buffers.fields_rebuilt);
        assert_eq!(buffers.field_entries, 8 + 64);

        // Shrinking keeps the allocation but still relays the fields.
        let buffers = assembler.assemble(&two[1..]).unwrap();
        assert!(!buffers.reallocated);
        assert!(buffers.fields_rebuilt);
        assert_eq!(buffers.field_entries, 64);
        assert_eq!(assembler.headers()[0].start_offset, 0);
    }

    #[test]
    fn empty_scene_is_valid() {
        let mut assembler = SceneBufferAssembler::new();
        let buffers = assembler.assemble(&[]).unwrap();
        assert_eq!(buffers.object_count, 0);
        assert!(buffers.fields.is_empty());
        assert!(buffers.headers.is_empty());
    }

    #[test]
    fn singular_transform_is_rejected() {
        let objects = vec![SdfObject::new(
            field(1.0, 0.5),
            Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)),
        )];
        let mut assembler = SceneBufferAssembler::new();
        assert!(matches!(
            assembler.assemble(&objects),
            Err(SceneError::SingularTransform(0))
        ));
    }
}
