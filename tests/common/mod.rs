//! Fixture writers shared by the integration tests.
//!
//! Every helper writes into a caller-provided directory, normally a
//! `tempfile::TempDir` owned by the test.

#![allow(dead_code)]

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat, RgbaImage};

/// PNG bytes of a `width` x `height` image filled with `rgba`.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encoding a PNG in memory");
    bytes.into_inner()
}

pub fn write_png(dir: &Path, name: &str, rgba: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(2, 2, rgba)).expect("writing PNG fixture");
    path
}

/// One textured triangle per object. Every object uses material `mat`, whose
/// diffuse map is `texture`.
pub fn write_obj(dir: &Path, name: &str, objects: usize, texture: &str) -> PathBuf {
    let stem = name.trim_end_matches(".obj");
    let mut obj = format!("mtllib {stem}.mtl\n");
    for i in 0..objects {
        let base = 3 * i + 1;
        obj.push_str(&format!(
            "o part{i}\nv 0 0 {i}\nv 1 0 {i}\nv 0 1 {i}\nvt 0 0\nvt 1 0\nvt 0 1\n\
             usemtl mat\nf {a}/{a} {b}/{b} {c}/{c}\n",
            a = base,
            b = base + 1,
            c = base + 2
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, obj).expect("writing OBJ fixture");
    std::fs::write(
        dir.join(format!("{stem}.mtl")),
        format!("newmtl mat\nKd 1 1 1\nmap_Kd {texture}\n"),
    )
    .expect("writing MTL fixture");
    path
}

/// An untextured single triangle.
pub fn write_plain_obj(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
        .expect("writing OBJ fixture");
    path
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// Binary glTF with `primitives` triangles and `images` embedded copies of
/// `png`. Primitive `i` uses material `i % images`, material `j` samples
/// image `j`.
pub fn write_glb(dir: &Path, name: &str, png: &[u8], images: usize, primitives: usize) -> PathBuf {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u32; 3] = [0, 1, 2];
    let mut bin: Vec<u8> = Vec::new();
    bin.extend_from_slice(bytemuck::cast_slice(&positions));
    bin.extend_from_slice(bytemuck::cast_slice(&indices));
    let image_offset = bin.len();
    bin.extend_from_slice(png);
    pad_to_four(&mut bin, 0);

    let materials: Vec<String> = (0..images)
        .map(|j| format!(r#"{{"pbrMetallicRoughness":{{"baseColorTexture":{{"index":{j}}}}}}}"#))
        .collect();
    let textures: Vec<String> = (0..images).map(|j| format!(r#"{{"source":{j}}}"#)).collect();
    let image_entries: Vec<String> = (0..images)
        .map(|_| r#"{"bufferView":2,"mimeType":"image/png"}"#.to_string())
        .collect();
    let prims: Vec<String> = (0..primitives)
        .map(|i| {
            let material = if images > 0 {
                format!(r#","material":{}"#, i % images)
            } else {
                String::new()
            };
            format!(r#"{{"attributes":{{"POSITION":0}},"indices":1{material}}}"#)
        })
        .collect();

    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"nodes":[{{"mesh":0}}],
"meshes":[{{"name":"tri","primitives":[{prims}]}}],
"materials":[{materials}],"textures":[{textures}],"images":[{image_entries}],
"accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}},
{{"bufferView":1,"componentType":5125,"count":3,"type":"SCALAR"}}],
"bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},{{"buffer":0,"byteOffset":36,"byteLength":12}},
{{"buffer":0,"byteOffset":{image_offset},"byteLength":{png_len}}}],
"buffers":[{{"byteLength":{bin_len}}}]}}"#,
        prims = prims.join(","),
        materials = materials.join(","),
        textures = textures.join(","),
        image_entries = image_entries.join(","),
        png_len = png.len(),
        bin_len = bin.len(),
    );
    let mut json = json.into_bytes();
    pad_to_four(&mut json, b' ');

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);

    let path = dir.join(name);
    std::fs::write(&path, glb).expect("writing GLB fixture");
    path
}

/// Text glTF with one triangle whose base colour image is `png` inlined as a
/// base64 `data:` URI. Geometry lives in `<name>.bin` next to the file.
pub fn write_gltf_data_uri(dir: &Path, name: &str, png: &[u8]) -> PathBuf {
    use base64::Engine;

    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u32; 3] = [0, 1, 2];
    let mut bin: Vec<u8> = Vec::new();
    bin.extend_from_slice(bytemuck::cast_slice(&positions));
    bin.extend_from_slice(bytemuck::cast_slice(&indices));
    let bin_name = format!("{name}.bin");
    std::fs::write(dir.join(&bin_name), &bin).expect("writing glTF buffer fixture");

    let payload = base64::engine::general_purpose::STANDARD.encode(png);
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"nodes":[{{"mesh":0}}],
"meshes":[{{"name":"tri","primitives":[{{"attributes":{{"POSITION":0}},"indices":1,"material":0}}]}}],
"materials":[{{"pbrMetallicRoughness":{{"baseColorTexture":{{"index":0}}}}}}],
"textures":[{{"source":0}}],"images":[{{"uri":"data:image/png;base64,{payload}"}}],
"accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}},
{{"bufferView":1,"componentType":5125,"count":3,"type":"SCALAR"}}],
"bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},{{"buffer":0,"byteOffset":36,"byteLength":12}}],
"buffers":[{{"uri":"{bin_name}","byteLength":{bin_len}}}]}}"#,
        bin_len = bin.len(),
    );
    let path = dir.join(name);
    std::fs::write(&path, json).expect("writing glTF fixture");
    path
}
