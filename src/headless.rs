//! Window-less model inspection.
//!
//! Runs the full import against a [`RecordingDevice`] so texture
//! deduplication and canonical keys are exercised exactly as in the viewer,
//! then releases everything again.

use std::{fmt, path::Path};

use crate::{
    data_structures::model::GpuMesh,
    gpu::recording::RecordingDevice,
    resources::{
        import_model, model_directory,
        scene::SceneParser,
        texture::{TextureCache, TextureLoader},
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshSummary {
    pub name: String,
    pub vertices: usize,
    pub indices: usize,
    /// Canonical keys of the mesh textures.
    pub textures: Vec<String>,
}

impl fmt::Display for MeshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "<unnamed>" } else { &self.name };
        write!(f, "{name}: {} vertices, {} indices", self.vertices, self.indices)?;
        for key in &self.textures {
            write!(f, "\n    diffuse {key}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectReport {
    pub meshes: Vec<MeshSummary>,
    /// Distinct textures uploaded for the model.
    pub unique_textures: usize,
}

/// Imports `path`, uploads it to a recording device and releases it again.
pub fn inspect_model<P>(parser: &P, path: &Path, default_color: [f32; 3]) -> InspectReport
where
    P: SceneParser + ?Sized,
{
    let mut device = RecordingDevice::new();
    let mut cache = TextureCache::new();
    let model_dir = model_directory(path);

    let sub_meshes = {
        let mut loader = TextureLoader::new(&mut device, &mut cache);
        import_model(parser, &mut loader, path, &model_dir, default_color)
    };
    let meshes: Vec<MeshSummary> = sub_meshes
        .iter()
        .map(|data| MeshSummary {
            name: data.name.clone(),
            vertices: data.vertex_count(),
            indices: data.indices.len(),
            textures: data.textures.iter().map(|t| t.key.clone()).collect(),
        })
        .collect();
    let unique_textures = cache.len();

    for data in sub_meshes {
        GpuMesh::new(&mut device, data).release(&mut device);
    }
    cache.release_all(&mut device);
    if !device.is_clean() {
        log::warn!("Inspection left GPU objects behind");
    }

    InspectReport {
        meshes,
        unique_textures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::scene::{
        EmbeddedTexture, ParseError, ParsedMaterial, ParsedMesh, ParsedScene, PostProcessSteps,
        TextureSlot,
    };

    struct TwoMeshes;

    impl SceneParser for TwoMeshes {
        fn read_file(&self, _: &Path, _: PostProcessSteps) -> Result<ParsedScene, ParseError> {
            let mesh = ParsedMesh {
                name: "quad".into(),
                positions: vec![[0.0; 3]; 4],
                faces: vec![vec![0, 1, 2], vec![0, 2, 3]],
                material_index: Some(0),
                ..Default::default()
            };
            Ok(ParsedScene {
                meshes: vec![mesh.clone(), mesh],
                materials: vec![ParsedMaterial::new("m").with_texture(TextureSlot::BaseColor, "*0")],
                embedded_textures: vec![EmbeddedTexture {
                    width: 1,
                    height: 1,
                    format_hint: None,
                    data: vec![0, 0, 0, 255],
                }],
                incomplete: false,
                has_root_node: true,
            })
        }
    }

    #[test]
    fn report_lists_meshes_and_shared_textures() {
        let report = inspect_model(&TwoMeshes, Path::new("scene.glb"), [0.8; 3]);
        assert_eq!(report.meshes.len(), 2);
        assert_eq!(report.meshes[0].vertices, 4);
        assert_eq!(report.meshes[0].indices, 6);
        assert_eq!(report.meshes[1].textures, vec!["scene.glb*0".to_string()]);
        assert_eq!(report.unique_textures, 1);
        assert_eq!(
            report.meshes[0].to_string(),
            "quad: 4 vertices, 6 indices\n    diffuse scene.glb*0"
        );
    }
}
