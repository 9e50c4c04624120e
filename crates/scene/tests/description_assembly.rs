use anyhow::Result;
use compute::gpu_types::ObjectHeader;
use scene::{SceneBufferAssembler, SceneDescription};

const SCENE: &str = r#"{
    "objects": [
        { "shape": "sphere", "radius": 0.5, "voxel_size": 0.25, "position": [0, 0, -4] },
        { "shape": "box", "half_extents": [0.5, 0.5, 0.5], "voxel_size": 0.25, "position": [2, 0, -4],
          "albedo": [0.2, 0.4, 0.8, 1.0] }
    ]
}"#;

#[test]
fn described_scene_assembles_into_contiguous_buffers() -> Result<()> {
    let objects = SCENE.parse::<SceneDescription>()?.into_objects()?;
    let mut assembler = SceneBufferAssembler::new();
    let buffers = assembler.assemble(&objects)?;

    let headers: &[ObjectHeader] = bytemuck::cast_slice(&buffers.headers.data);
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[1].start_offset, headers[0].num_entries);
    assert_eq!(
        (headers[0].num_entries + headers[1].num_entries) as usize,
        buffers.fields.len()
    );
    assert_eq!(headers[1].albedo, [0.2, 0.4, 0.8, 1.0]);
    // Sphere of radius 0.5 padded by two 0.25 voxels: world box is 2 wide around z = -4.
    assert!((headers[0].world_min[2] + 5.0).abs() < 1e-5);
    assert!((headers[0].world_max[2] + 3.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn reloading_the_same_file_rebuilds_fields_once_per_load() -> Result<()> {
    let mut assembler = SceneBufferAssembler::new();
    let first = SCENE.parse::<SceneDescription>()?.into_objects()?;
    assert!(assembler.assemble(&first)?.fields_rebuilt);
    assert!(!assembler.assemble(&first)?.fields_rebuilt);

    // A reload produces new field allocations even when the contents match.
    let reloaded = SCENE.parse::<SceneDescription>()?.into_objects()?;
    let buffers = assembler.assemble(&reloaded)?;
    assert!(buffers.fields_rebuilt);
    assert!(!buffers.reallocated);
    Ok(())
}
