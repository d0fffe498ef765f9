//! The scene-parsing collaborator.
//!
//! A [`SceneParser`] turns a model file into a [`ParsedScene`]: a flat list of
//! sub-meshes, a material table and a table of textures embedded in the file.
//! Format specific readers live next to this module (`obj`, `gltf`); the
//! post-processing steps shared by all of them live here.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model format '{extension}'")]
    UnsupportedFormat { extension: String },
    #[error("{0}")]
    Format(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Which texture list of a material to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// PBR base colour (glTF).
    BaseColor,
    /// Classic diffuse map (OBJ `map_Kd`).
    Diffuse,
}

/// A material reduced to the texture references the viewer cares about.
///
/// A reference is either a path (relative to the model or absolute) or `*N`
/// pointing at entry `N` of [`ParsedScene::embedded_textures`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedMaterial {
    pub name: String,
    pub textures: HashMap<TextureSlot, Vec<String>>,
}

impl ParsedMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: HashMap::new(),
        }
    }

    pub fn with_texture(mut self, slot: TextureSlot, reference: impl Into<String>) -> Self {
        self.textures
            .entry(slot)
            .or_default()
            .push(reference.into());
        self
    }

    pub fn texture_count(&self, slot: TextureSlot) -> usize {
        self.textures.get(&slot).map_or(0, Vec::len)
    }

    pub fn textures(&self, slot: TextureSlot) -> &[String] {
        self.textures.get(&slot).map_or(&[], Vec::as_slice)
    }
}

/// Texture data stored inside the model file.
///
/// `height == 0` means `data` is a compressed image (PNG, JPEG, ...) of
/// `width` bytes. Otherwise `data` holds `width * height` raw 4-component
/// texels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddedTexture {
    pub width: u32,
    pub height: u32,
    pub format_hint: Option<String>,
    pub data: Vec<u8>,
}

impl EmbeddedTexture {
    pub fn compressed(data: Vec<u8>, format_hint: Option<String>) -> Self {
        Self {
            width: data.len() as u32,
            height: 0,
            format_hint,
            data,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.height == 0
    }
}

/// One sub-mesh. Optional attributes are `None` when the source has none.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Vertex colour set 0, alpha dropped.
    pub colors: Option<Vec<[f32; 3]>>,
    /// UV set 0 with the origin in the bottom-left corner until
    /// [`PostProcessSteps::flip_uvs`] runs.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Faces as index lists; triangles once [`PostProcessSteps::triangulate`]
    /// ran.
    pub faces: Vec<Vec<u32>>,
    pub material_index: Option<usize>,
}

impl ParsedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Output of a [`SceneParser`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedScene {
    pub meshes: Vec<ParsedMesh>,
    pub materials: Vec<ParsedMaterial>,
    pub embedded_textures: Vec<EmbeddedTexture>,
    /// Set when the file parsed but produced nothing usable.
    pub incomplete: bool,
    pub has_root_node: bool,
}

impl ParsedScene {
    /// Resolves an `*N` reference.
    pub fn embedded_texture(&self, reference: &str) -> Option<&EmbeddedTexture> {
        let index = embedded_index(reference)?;
        self.embedded_textures.get(index)
    }
}

/// Parses the index out of an `*N` embedded texture reference.
pub fn embedded_index(reference: &str) -> Option<usize> {
    reference.strip_prefix('*')?.parse().ok()
}

/// Processing the importer asks the parser to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcessSteps {
    pub triangulate: bool,
    /// Only applied to meshes that have no normals.
    pub gen_smooth_normals: bool,
    pub join_identical_vertices: bool,
    /// Converts UVs to a top-left origin, matching how images are uploaded.
    pub flip_uvs: bool,
    pub validate: bool,
}

impl PostProcessSteps {
    pub const VIEWER: PostProcessSteps = PostProcessSteps {
        triangulate: true,
        gen_smooth_normals: true,
        join_identical_vertices: true,
        flip_uvs: true,
        validate: true,
    };
}

impl Default for PostProcessSteps {
    fn default() -> Self {
        Self::VIEWER
    }
}

/// Reads a model file into a [`ParsedScene`].
pub trait SceneParser {
    fn read_file(&self, path: &Path, steps: PostProcessSteps) -> Result<ParsedScene, ParseError>;
}

/// Picks a reader by file extension and applies the post-processing steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSceneParser;

impl SceneParser for FileSceneParser {
    fn read_file(&self, path: &Path, steps: PostProcessSteps) -> Result<ParsedScene, ParseError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mut scene = match extension.as_str() {
            "obj" => super::obj::read_obj(path)?,
            "gltf" | "glb" => super::gltf::read_gltf(path)?,
            _ => return Err(ParseError::UnsupportedFormat { extension }),
        };
        post_process(&mut scene, steps)?;
        Ok(scene)
    }
}

/// Applies `steps` in a fixed order: triangulate, join, normals, flip,
/// validate. Validation runs last so it sees the final data.
pub fn post_process(scene: &mut ParsedScene, steps: PostProcessSteps) -> Result<(), ParseError> {
    // Malformed attribute arrays would break the other steps.
    if steps.validate {
        validate_attributes(scene)?;
    }
    for mesh in &mut scene.meshes {
        if steps.triangulate {
            triangulate(mesh);
        }
        if steps.join_identical_vertices {
            join_identical_vertices(mesh);
        }
        if steps.gen_smooth_normals && mesh.normals.is_none() {
            generate_smooth_normals(mesh);
        }
        if steps.flip_uvs {
            flip_uvs(mesh);
        }
    }
    scene.incomplete |= scene.meshes.is_empty();
    if steps.validate {
        validate(scene)?;
    }
    Ok(())
}

/// Fan-splits polygons. Point and line faces cannot be drawn as triangles and
/// are dropped.
pub fn triangulate(mesh: &mut ParsedMesh) {
    if mesh.faces.iter().all(|face| face.len() == 3) {
        return;
    }
    let mut dropped = 0usize;
    let faces = std::mem::take(&mut mesh.faces);
    for face in faces {
        match face.len() {
            0..=2 => dropped += 1,
            3 => mesh.faces.push(face),
            _ => {
                for i in 1..face.len() - 1 {
                    mesh.faces.push(vec![face[0], face[i], face[i + 1]]);
                }
            }
        }
    }
    if dropped > 0 {
        log::debug!(
            "Dropped {dropped} point/line faces from mesh '{}'",
            mesh.name
        );
    }
}

/// Merges vertices whose attributes are bitwise identical and rewrites the
/// faces to point at the survivors.
pub fn join_identical_vertices(mesh: &mut ParsedMesh) {
    let count = mesh.vertex_count();
    let consistent = mesh.normals.as_ref().is_none_or(|n| n.len() == count)
        && mesh.colors.as_ref().is_none_or(|c| c.len() == count)
        && mesh.tex_coords.as_ref().is_none_or(|t| t.len() == count);
    if !consistent {
        return;
    }
    let key_of = |i: usize| -> Vec<u32> {
        let mut key: Vec<u32> = mesh.positions[i].iter().map(|f| f.to_bits()).collect();
        if let Some(normals) = &mesh.normals {
            key.extend(normals[i].iter().map(|f| f.to_bits()));
        }
        if let Some(colors) = &mesh.colors {
            key.extend(colors[i].iter().map(|f| f.to_bits()));
        }
        if let Some(uvs) = &mesh.tex_coords {
            key.extend(uvs[i].iter().map(|f| f.to_bits()));
        }
        key
    };

    let mut unique: HashMap<Vec<u32>, u32> = HashMap::with_capacity(count);
    let mut remap = Vec::with_capacity(count);
    let mut kept = Vec::new();
    for i in 0..count {
        let next = kept.len() as u32;
        let target = *unique.entry(key_of(i)).or_insert(next);
        if target == next {
            kept.push(i);
        }
        remap.push(target);
    }
    if kept.len() == count {
        return;
    }

    fn gather<T: Copy>(values: &[T], kept: &[usize]) -> Vec<T> {
        kept.iter().map(|&i| values[i]).collect()
    }
    mesh.positions = gather(&mesh.positions, &kept);
    mesh.normals = mesh.normals.as_deref().map(|n| gather(n, &kept));
    mesh.colors = mesh.colors.as_deref().map(|c| gather(c, &kept));
    mesh.tex_coords = mesh.tex_coords.as_deref().map(|t| gather(t, &kept));
    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            if let Some(&target) = remap.get(*index as usize) {
                *index = target;
            }
        }
    }
}

/// Area-weighted vertex normals from the triangle faces.
pub fn generate_smooth_normals(mesh: &mut ParsedMesh) {
    use cgmath::{InnerSpace, Vector3, Zero};

    let mut sums = vec![Vector3::<f32>::zero(); mesh.vertex_count()];
    for face in mesh.faces.iter().filter(|face| face.len() == 3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if a >= sums.len() || b >= sums.len() || c >= sums.len() {
            continue;
        }
        let p0: Vector3<f32> = mesh.positions[a].into();
        let p1: Vector3<f32> = mesh.positions[b].into();
        let p2: Vector3<f32> = mesh.positions[c].into();
        // Unnormalised cross product: its length is twice the face area.
        let face_normal = (p1 - p0).cross(p2 - p0);
        sums[a] += face_normal;
        sums[b] += face_normal;
        sums[c] += face_normal;
    }
    mesh.normals = Some(
        sums.into_iter()
            .map(|n| {
                if n.magnitude2() > f32::EPSILON {
                    n.normalize().into()
                } else {
                    [0.0, 0.0, 0.0]
                }
            })
            .collect(),
    );
}

pub fn flip_uvs(mesh: &mut ParsedMesh) {
    if let Some(uvs) = &mut mesh.tex_coords {
        uvs.iter_mut().for_each(|uv| uv[1] = 1.0 - uv[1]);
    }
}

fn validate_attributes(scene: &ParsedScene) -> Result<(), ParseError> {
    for (i, mesh) in scene.meshes.iter().enumerate() {
        let count = mesh.vertex_count();
        let check = |len: Option<usize>, what: &str| match len {
            Some(len) if len != count => Err(ParseError::Validation(format!(
                "mesh {i} ('{}') has {len} {what} for {count} vertices",
                mesh.name
            ))),
            _ => Ok(()),
        };
        check(mesh.normals.as_ref().map(Vec::len), "normals")?;
        check(mesh.colors.as_ref().map(Vec::len), "colours")?;
        check(mesh.tex_coords.as_ref().map(Vec::len), "texture coordinates")?;
    }
    Ok(())
}

fn validate(scene: &ParsedScene) -> Result<(), ParseError> {
    validate_attributes(scene)?;
    for (i, mesh) in scene.meshes.iter().enumerate() {
        let count = mesh.vertex_count();
        if let Some(index) = mesh.faces.iter().flatten().find(|&&idx| idx as usize >= count) {
            return Err(ParseError::Validation(format!(
                "mesh {i} ('{}') references vertex {index} but has only {count}",
                mesh.name
            )));
        }
        if let Some(material) = mesh.material_index {
            if material >= scene.materials.len() {
                return Err(ParseError::Validation(format!(
                    "mesh {i} ('{}') references material {material} but only {} exist",
                    mesh.name,
                    scene.materials.len()
                )));
            }
        }
    }
    Ok(())
}
