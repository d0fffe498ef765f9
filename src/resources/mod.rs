//! Everything that turns a model file into GPU-ready meshes.
//!
//! - `scene` defines the parser interface and the shared post-processing
//! - `obj` and `gltf` read the supported file formats
//! - `texture` owns the texture cache and the deduplicating loader
//! - `material` picks and loads the textures of a material
//!
//! [`import_model`] ties them together and produces one [`SubMeshData`] per
//! sub-mesh; [`load_model`] uploads the result.

pub mod gltf;
pub mod material;
pub mod obj;
pub mod scene;
pub mod texture;

use std::path::Path;

use crate::{
    data_structures::model::{FLOATS_PER_VERTEX, GpuMesh, SubMeshData},
    gpu::RenderDevice,
    resources::{
        material::resolve_material,
        scene::{ParsedMesh, PostProcessSteps, SceneParser},
        texture::{TextureCache, TextureLoader},
    },
};

/// Directory part of `path` as used for texture keys. Empty for bare file
/// names.
pub fn model_directory(path: &Path) -> String {
    path.parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads `path` and converts every sub-mesh into interleaved vertex records,
/// a triangle index list and its textures.
///
/// Any parser failure, an incomplete scene or a scene without a root node is
/// logged with the parser's diagnostic and yields an empty list.
pub fn import_model<P, D>(
    parser: &P,
    loader: &mut TextureLoader<'_, D>,
    path: &Path,
    model_dir: &str,
    default_color: [f32; 3],
) -> Vec<SubMeshData>
where
    P: SceneParser + ?Sized,
    D: RenderDevice + ?Sized,
{
    let scene = match parser.read_file(path, PostProcessSteps::VIEWER) {
        Ok(scene) if scene.incomplete => {
            log::error!("Failed to load model {}: scene is incomplete", path.display());
            return Vec::new();
        }
        Ok(scene) if !scene.has_root_node => {
            log::error!("Failed to load model {}: scene has no root node", path.display());
            return Vec::new();
        }
        Ok(scene) => scene,
        Err(e) => {
            log::error!("Failed to load model {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let model_path = path.to_string_lossy();
    let sub_meshes: Vec<SubMeshData> = scene
        .meshes
        .iter()
        .map(|mesh| {
            let (vertices, indices) = interleave(mesh, default_color);
            let textures = mesh
                .material_index
                .and_then(|index| scene.materials.get(index))
                .map(|material| resolve_material(loader, material, model_dir, &scene, &model_path))
                .unwrap_or_default();
            SubMeshData {
                name: mesh.name.clone(),
                vertices,
                indices,
                textures,
            }
        })
        .collect();

    log::info!(
        "Imported {} ({} sub-meshes, {} materials, {} embedded textures)",
        path.display(),
        sub_meshes.len(),
        scene.materials.len(),
        scene.embedded_textures.len()
    );
    sub_meshes
}

/// Builds the interleaved records (position, normal, colour, uv) and the flat
/// index list of one triangulated mesh. Missing normals become zero, missing
/// colours `default_color` and missing UVs zero.
pub fn interleave(mesh: &ParsedMesh, default_color: [f32; 3]) -> (Vec<f32>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(mesh.vertex_count() * FLOATS_PER_VERTEX);
    for (i, position) in mesh.positions.iter().enumerate() {
        let normal = mesh
            .normals
            .as_ref()
            .and_then(|n| n.get(i))
            .copied()
            .unwrap_or([0.0; 3]);
        let color = mesh
            .colors
            .as_ref()
            .and_then(|c| c.get(i))
            .copied()
            .unwrap_or(default_color);
        let uv = mesh
            .tex_coords
            .as_ref()
            .and_then(|t| t.get(i))
            .copied()
            .unwrap_or([0.0; 2]);
        vertices.extend_from_slice(position);
        vertices.extend_from_slice(&normal);
        vertices.extend_from_slice(&color);
        vertices.extend_from_slice(&uv);
    }
    let indices = mesh.faces.iter().flatten().copied().collect();
    (vertices, indices)
}

/// Imports `path` and uploads every sub-mesh to `device`.
///
/// Textures go through `cache`, so ones already uploaded by an earlier model
/// are reused. Returns an empty list when the import fails.
pub fn load_model<P, D>(
    parser: &P,
    device: &mut D,
    cache: &mut TextureCache,
    path: &Path,
    default_color: [f32; 3],
) -> Vec<GpuMesh>
where
    P: SceneParser + ?Sized,
    D: RenderDevice + ?Sized,
{
    let model_dir = model_directory(path);
    let sub_meshes = {
        let mut loader = TextureLoader::new(device, cache);
        import_model(parser, &mut loader, path, &model_dir, default_color)
    };
    sub_meshes
        .into_iter()
        .map(|data| GpuMesh::new(device, data))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::scene::{ParseError, ParsedMaterial, ParsedScene, TextureSlot};

    struct FixedParser(Result<ParsedScene, &'static str>);

    impl SceneParser for FixedParser {
        fn read_file(&self, _: &Path, _: PostProcessSteps) -> Result<ParsedScene, ParseError> {
            self.0.clone().map_err(|e| ParseError::Format(e.to_string()))
        }
    }

    fn triangle() -> ParsedMesh {
        ParsedMesh {
            name: "tri".into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![vec![0, 1, 2]],
            ..Default::default()
        }
    }

    #[test]
    fn missing_attributes_take_their_defaults() {
        let (vertices, indices) = interleave(&triangle(), [0.8, 0.7, 0.6]);
        assert_eq!(vertices.len(), 3 * FLOATS_PER_VERTEX);
        assert_eq!(indices, vec![0, 1, 2]);
        for record in vertices.chunks_exact(FLOATS_PER_VERTEX) {
            assert_eq!(&record[3..6], &[0.0, 0.0, 0.0]);
            assert_eq!(&record[6..9], &[0.8, 0.7, 0.6]);
            assert_eq!(&record[9..11], &[0.0, 0.0]);
        }
        assert_eq!(&vertices[11..14], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn present_attributes_keep_their_order() {
        let mesh = ParsedMesh {
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            colors: Some(vec![[1.0, 0.0, 0.0]; 3]),
            tex_coords: Some(vec![[0.25, 0.75]; 3]),
            ..triangle()
        };
        let (vertices, _) = interleave(&mesh, [0.5; 3]);
        assert_eq!(
            &vertices[..FLOATS_PER_VERTEX],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.25, 0.75]
        );
    }

    #[test]
    fn parser_failures_import_nothing() {
        let mut device = crate::gpu::recording::RecordingDevice::new();
        let mut cache = TextureCache::new();
        let parser = FixedParser(Err("broken"));
        let meshes = load_model(&parser, &mut device, &mut cache, Path::new("x.obj"), [0.8; 3]);
        assert!(meshes.is_empty());
        assert!(device.is_clean());
    }

    #[test]
    fn incomplete_or_rootless_scenes_import_nothing() {
        let mut device = crate::gpu::recording::RecordingDevice::new();
        let mut cache = TextureCache::new();
        let incomplete = ParsedScene {
            meshes: vec![triangle()],
            incomplete: true,
            has_root_node: true,
            ..Default::default()
        };
        let rootless = ParsedScene {
            meshes: vec![triangle()],
            ..Default::default()
        };
        for scene in [incomplete, rootless] {
            let mut loader = TextureLoader::new(&mut device, &mut cache);
            let parser = FixedParser(Ok(scene));
            let imported = import_model(&parser, &mut loader, Path::new("x.obj"), "", [0.8; 3]);
            assert!(imported.is_empty());
        }
    }

    #[test]
    fn materials_resolve_through_the_scene() {
        let mut device = crate::gpu::recording::RecordingDevice::new();
        let mut cache = TextureCache::new();
        let scene = ParsedScene {
            meshes: vec![
                ParsedMesh {
                    material_index: Some(0),
                    ..triangle()
                },
                triangle(),
            ],
            materials: vec![ParsedMaterial::new("m").with_texture(TextureSlot::BaseColor, "*0")],
            embedded_textures: vec![crate::resources::scene::EmbeddedTexture {
                width: 1,
                height: 1,
                format_hint: None,
                data: vec![255; 4],
            }],
            incomplete: false,
            has_root_node: true,
        };
        let parser = FixedParser(Ok(scene));
        let mut meshes = load_model(&parser, &mut device, &mut cache, Path::new("m/x.glb"), [0.8; 3]);
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].textures()[0].key, "m/x.glb*0");
        assert!(meshes[1].textures().is_empty());

        meshes.iter_mut().for_each(|mesh| mesh.release(&mut device));
        cache.release_all(&mut device);
        assert!(device.is_clean());
    }

    #[test]
    fn model_directory_of_bare_names_is_empty() {
        assert_eq!(model_directory(Path::new("x.obj")), "");
        assert_eq!(model_directory(Path::new("/models/x.obj")), "/models");
    }
}
