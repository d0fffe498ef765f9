//! Wavefront OBJ reader backed by `tobj`.

use std::path::Path;

use crate::resources::scene::{ParseError, ParsedMaterial, ParsedMesh, ParsedScene, TextureSlot};

/// Reads an OBJ file and its material library.
///
/// Faces are kept as polygons and vertices are not merged here; the shared
/// post-processing steps take care of both. A missing or broken `.mtl` only
/// costs the materials.
pub fn read_obj(path: &Path) -> Result<ParsedScene, ParseError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => ParseError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        },
        other => ParseError::Format(format!("OBJ: {other}")),
    })?;

    let materials = match materials {
        Ok(materials) => materials
            .into_iter()
            .map(|m| {
                let material = ParsedMaterial::new(m.name);
                match m.diffuse_texture {
                    Some(texture) if !texture.is_empty() => {
                        material.with_texture(TextureSlot::Diffuse, texture)
                    }
                    _ => material,
                }
            })
            .collect(),
        Err(e) => {
            log::warn!(
                "Material library of {} could not be loaded: {}",
                path.display(),
                e
            );
            Vec::new()
        }
    };

    let meshes = models.into_iter().map(to_parsed_mesh).collect();
    Ok(ParsedScene {
        meshes,
        materials,
        embedded_textures: Vec::new(),
        incomplete: false,
        has_root_node: true,
    })
}

fn to_parsed_mesh(model: tobj::Model) -> ParsedMesh {
    let mesh = model.mesh;
    let vertex_count = mesh.positions.len() / 3;
    let triples = |values: &[f32]| -> Vec<[f32; 3]> {
        values
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    };

    let positions = triples(&mesh.positions);
    let normals = (mesh.normals.len() == vertex_count * 3 && vertex_count > 0)
        .then(|| triples(&mesh.normals));
    let colors = (mesh.vertex_color.len() == vertex_count * 3 && vertex_count > 0)
        .then(|| triples(&mesh.vertex_color));
    let tex_coords = (mesh.texcoords.len() == vertex_count * 2 && vertex_count > 0).then(|| {
        mesh.texcoords
            .chunks_exact(2)
            .map(|c| [c[0], c[1]])
            .collect()
    });

    let faces = split_faces(&model.name, &mesh.indices, &mesh.face_arities);

    ParsedMesh {
        name: model.name,
        positions,
        normals,
        colors,
        tex_coords,
        faces,
        material_index: mesh.material_id,
    }
}

/// Cuts the flat index list into faces. No arities means all triangles. Faces
/// whose arity runs past the end of `indices` are dropped.
fn split_faces(name: &str, indices: &[u32], arities: &[u32]) -> Vec<Vec<u32>> {
    if arities.is_empty() {
        return indices.chunks_exact(3).map(<[u32]>::to_vec).collect();
    }
    let mut next = 0usize;
    arities
        .iter()
        .filter_map(|&arity| {
            let end = next + arity as usize;
            let face = indices.get(next..end).map(<[u32]>::to_vec);
            if face.is_none() {
                log::warn!(
                    "Mesh '{name}': face of arity {arity} at index {next} exceeds {} indices, skipped",
                    indices.len()
                );
            }
            next = end;
            face
        })
        .collect()
}
