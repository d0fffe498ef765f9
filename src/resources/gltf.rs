//! glTF 2.0 (`.gltf` and `.glb`) reader backed by the `gltf` crate.
//!
//! Every primitive of every mesh becomes one sub-mesh, in document order.
//! Node transforms are ignored. Images stored in buffer views become the
//! embedded-texture table and are referenced as `*N`, and so do base64
//! `data:` URIs. Any other URI stays an external reference.

use std::{collections::HashMap, path::Path};

use base64::Engine;
use gltf::mesh::Mode;

use crate::resources::scene::{
    EmbeddedTexture, ParseError, ParsedMaterial, ParsedMesh, ParsedScene, TextureSlot,
};

pub fn read_gltf(path: &Path) -> Result<ParsedScene, ParseError> {
    let gltf = gltf::Gltf::open(path).map_err(|e| match e {
        gltf::Error::Io(source) => ParseError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => ParseError::Format(format!("glTF: {other}")),
    })?;
    let base = path.parent();
    let buffers = gltf::import_buffers(&gltf.document, base, gltf.blob.clone())
        .map_err(|e| ParseError::Format(format!("glTF buffers: {e}")))?;
    let document = &gltf.document;

    // image index -> texture reference
    let mut embedded_textures = Vec::new();
    let mut image_refs: HashMap<usize, String> = HashMap::new();
    for image in document.images() {
        match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let Some(buffer) = buffers.get(view.buffer().index()) else {
                    log::warn!("Image {} points at a missing buffer", image.index());
                    continue;
                };
                let start = view.offset();
                let end = start + view.length();
                let Some(bytes) = buffer.0.get(start..end) else {
                    log::warn!("Image {} lies outside its buffer", image.index());
                    continue;
                };
                let hint = mime_type.split('/').last().map(str::to_string);
                image_refs.insert(image.index(), format!("*{}", embedded_textures.len()));
                embedded_textures.push(EmbeddedTexture::compressed(bytes.to_vec(), hint));
            }
            gltf::image::Source::Uri { uri, .. } => {
                if uri.starts_with("data:") {
                    match decode_data_uri(uri) {
                        Ok((bytes, hint)) => {
                            image_refs
                                .insert(image.index(), format!("*{}", embedded_textures.len()));
                            embedded_textures.push(EmbeddedTexture::compressed(bytes, hint));
                        }
                        Err(e) => log::error!(
                            "Image {} of {} has an unreadable data URI: {e}",
                            image.index(),
                            path.display()
                        ),
                    }
                    continue;
                }
                image_refs.insert(image.index(), uri.to_string());
            }
        }
    }

    let materials = document
        .materials()
        .map(|material| {
            let name = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material{}", material.index().unwrap_or_default()));
            let parsed = ParsedMaterial::new(name);
            let base_color = material
                .pbr_metallic_roughness()
                .base_color_texture()
                .and_then(|info| image_refs.get(&info.texture().source().index()));
            match base_color {
                Some(reference) => parsed.with_texture(TextureSlot::BaseColor, reference.clone()),
                None => parsed,
            }
        })
        .collect();

    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let name = match mesh.name() {
                Some(name) => format!("{}#{}", name, primitive.index()),
                None => format!("mesh{}#{}", mesh.index(), primitive.index()),
            };
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let Some(positions) = reader.read_positions() else {
                log::warn!("Primitive {name} has no positions and is skipped");
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals = reader.read_normals().map(|n| n.collect::<Vec<_>>());
            let colors = reader
                .read_colors(0)
                .map(|c| c.into_rgb_f32().collect::<Vec<_>>());
            // glTF puts the UV origin top-left; scenes carry bottom-left UVs
            // until the flip step.
            let tex_coords = reader.read_tex_coords(0).map(|t| {
                t.into_f32()
                    .map(|[u, v]| [u, 1.0 - v])
                    .collect::<Vec<_>>()
            });
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            meshes.push(ParsedMesh {
                name,
                positions,
                normals,
                colors,
                tex_coords,
                faces: faces_for_mode(primitive.mode(), &indices),
                // glTF primitives without a material use the default material,
                // which has no textures.
                material_index: primitive.material().index(),
            });
        }
    }

    Ok(ParsedScene {
        meshes,
        materials,
        embedded_textures,
        incomplete: false,
        has_root_node: document.scenes().len() > 0 || document.nodes().len() > 0,
    })
}

/// Splits `data:<mime>;base64,<payload>` into the decoded payload and the
/// mime subtype, which serves as the format hint.
fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, Option<String>), String> {
    let rest = uri.strip_prefix("data:").ok_or("not a data URI")?;
    let (header, payload) = rest.split_once(',').ok_or("missing payload separator")?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or("only base64 payloads are supported")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| e.to_string())?;
    let hint = mime
        .split_once('/')
        .map(|(_, subtype)| subtype.to_string())
        .filter(|subtype| !subtype.is_empty());
    Ok((bytes, hint))
}

/// Converts a primitive's index stream into faces.
fn faces_for_mode(mode: Mode, indices: &[u32]) -> Vec<Vec<u32>> {
    match mode {
        Mode::Triangles => indices.chunks_exact(3).map(|c| c.to_vec()).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    vec![w[0], w[1], w[2]]
                } else {
                    vec![w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|w| vec![hub, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        Mode::Points => indices.iter().map(|&i| vec![i]).collect(),
        Mode::Lines => indices.chunks_exact(2).map(|c| c.to_vec()).collect(),
        Mode::LineStrip | Mode::LineLoop => indices.windows(2).map(|w| w.to_vec()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_alternate_winding() {
        let faces = faces_for_mode(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![2, 1, 3]]);
    }

    #[test]
    fn fans_share_the_first_vertex() {
        let faces = faces_for_mode(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn lines_stay_two_index_faces() {
        let faces = faces_for_mode(Mode::Lines, &[0, 1, 2, 3]);
        assert!(faces.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn data_uri_payload_and_subtype_are_decoded() {
        let (bytes, hint) = decode_data_uri("data:image/png;base64,AAEC/w==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 255]);
        assert_eq!(hint.as_deref(), Some("png"));
    }

    #[test]
    fn malformed_data_uris_are_rejected() {
        assert!(decode_data_uri("data:image/png,plain").is_err());
        assert!(decode_data_uri("data:image/png;base64").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }
}
