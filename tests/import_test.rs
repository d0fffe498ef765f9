mod common;

use mesh_viewer::{
    data_structures::model::{FLOATS_PER_VERTEX, GpuMesh, SubMeshData},
    gpu::recording::RecordingDevice,
    resources::{
        import_model, model_directory,
        scene::FileSceneParser,
        texture::{TextureCache, TextureLoader},
    },
};

fn import(path: &std::path::Path, device: &mut RecordingDevice, cache: &mut TextureCache) -> Vec<SubMeshData> {
    let dir = model_directory(path);
    let mut loader = TextureLoader::new(device, cache);
    import_model(&FileSceneParser, &mut loader, path, &dir, [0.8, 0.7, 0.6])
}

#[test]
fn single_triangle_gets_default_colour_and_zero_uvs() {
    let dir = tempfile::tempdir().unwrap();
    let obj = common::write_plain_obj(dir.path(), "tri.obj");
    let mut device = RecordingDevice::new();
    let mut cache = TextureCache::new();

    let sub_meshes = import(&obj, &mut device, &mut cache);
    assert_eq!(sub_meshes.len(), 1);
    let data = &sub_meshes[0];
    assert_eq!(data.vertices.len(), 3 * FLOATS_PER_VERTEX);
    assert_eq!(data.indices, vec![0, 1, 2]);
    assert!(data.textures.is_empty());
    for record in data.vertices.chunks_exact(FLOATS_PER_VERTEX) {
        assert_eq!(&record[6..9], &[0.8, 0.7, 0.6]);
        assert_eq!(&record[9..11], &[0.0, 0.0]);
    }
    assert_eq!(&data.vertices[FLOATS_PER_VERTEX..FLOATS_PER_VERTEX + 3], &[1.0, 0.0, 0.0]);
}

#[test]
fn triangle_uploads_into_one_valid_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let obj = common::write_plain_obj(dir.path(), "tri.obj");
    let mut device = RecordingDevice::new();
    let mut cache = TextureCache::new();

    let data = import(&obj, &mut device, &mut cache).remove(0);
    let mut mesh = GpuMesh::new(&mut device, data);
    assert!(!mesh.is_empty());
    assert_eq!(mesh.index_count(), 3);
    assert_eq!(device.live_buffers(), 2);
    assert_eq!(device.live_layouts(), 1);

    let mut moved = mesh.take();
    assert!(mesh.is_empty());
    mesh.release(&mut device);
    assert!(device.deleted_buffers().is_empty());

    moved.release(&mut device);
    assert!(device.is_clean());
}

#[test]
fn unsupported_or_broken_files_import_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("notes.txt");
    std::fs::write(&text, "not a model").unwrap();
    let glb = dir.path().join("broken.glb");
    std::fs::write(&glb, b"glTF garbage").unwrap();

    let mut device = RecordingDevice::new();
    let mut cache = TextureCache::new();
    for path in [text, glb, dir.path().join("absent.obj")] {
        assert!(import(&path, &mut device, &mut cache).is_empty(), "{}", path.display());
    }
    assert!(device.is_clean());
}

#[test]
fn textured_quads_keep_their_uvs() {
    let dir = tempfile::tempdir().unwrap();
    common::write_png(dir.path(), "tex.png", [1, 2, 3, 255]);
    let obj = common::write_obj(dir.path(), "one.obj", 1, "tex.png");
    let mut device = RecordingDevice::new();
    let mut cache = TextureCache::new();

    let data = import(&obj, &mut device, &mut cache).remove(0);
    // vt 1 0 flipped to v = 1
    let second = &data.vertices[FLOATS_PER_VERTEX..2 * FLOATS_PER_VERTEX];
    assert_eq!(&second[9..11], &[1.0, 1.0]);
    assert_eq!(data.textures.len(), 1);

    cache.release_all(&mut device);
    assert!(device.is_clean());
}

#[test]
fn empty_sub_meshes_stay_empty() {
    let mut device = RecordingDevice::new();
    let program = device.create_program();
    let no_indices = SubMeshData {
        name: "points".into(),
        vertices: vec![0.0; FLOATS_PER_VERTEX],
        indices: vec![],
        ..Default::default()
    };
    let no_vertices = SubMeshData {
        name: "dangling".into(),
        vertices: vec![],
        indices: vec![0, 1, 2],
        ..Default::default()
    };

    for data in [no_indices, no_vertices] {
        let mut mesh = GpuMesh::new(&mut device, data);
        assert!(mesh.is_empty(), "{}", mesh.name);
        assert_eq!(mesh.index_count(), 0);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_layouts(), 0);

        mesh.draw(&mut device, program);
        assert!(device.draws().is_empty());
        mesh.release(&mut device);
    }
    assert!(device.is_clean());
}
