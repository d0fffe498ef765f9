use crate::{
    data_structures::texture::{TextureDescriptor, TextureRole},
    gpu::RenderDevice,
    resources::{
        scene::{ParsedMaterial, ParsedScene, TextureSlot},
        texture::{TextureLoader, canonical_key},
    },
};

/// Loads the textures of one material.
///
/// Base colour maps win over classic diffuse maps; the diffuse slot is only
/// read when the material has no base colour map. Both end up tagged
/// [`TextureRole::Diffuse`]. Textures that fail to load are left out, so the
/// result may be empty.
pub fn resolve_material<D: RenderDevice + ?Sized>(
    loader: &mut TextureLoader<'_, D>,
    material: &ParsedMaterial,
    model_dir: &str,
    scene: &ParsedScene,
    model_path: &str,
) -> Vec<TextureDescriptor> {
    let slot = if material.texture_count(TextureSlot::BaseColor) > 0 {
        TextureSlot::BaseColor
    } else {
        TextureSlot::Diffuse
    };

    material
        .textures(slot)
        .iter()
        .filter_map(|reference| {
            let handle = loader
                .load(reference, model_dir, Some(scene), model_path)
                .ok()?;
            Some(TextureDescriptor {
                handle,
                role: TextureRole::Diffuse,
                key: canonical_key(reference, model_dir, model_path),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gpu::recording::RecordingDevice,
        resources::{scene::EmbeddedTexture, texture::TextureCache},
    };

    fn raw(width: u32, height: u32) -> EmbeddedTexture {
        EmbeddedTexture {
            width,
            height,
            format_hint: None,
            data: vec![128; (width * height * 4) as usize],
        }
    }

    #[test]
    fn base_colour_shadows_diffuse() {
        let mut device = RecordingDevice::new();
        let mut cache = TextureCache::new();
        let scene = ParsedScene {
            embedded_textures: vec![raw(1, 1), raw(2, 2)],
            ..Default::default()
        };
        let material = ParsedMaterial::new("m")
            .with_texture(TextureSlot::Diffuse, "*0")
            .with_texture(TextureSlot::BaseColor, "*1");

        let mut loader = TextureLoader::new(&mut device, &mut cache);
        let textures = resolve_material(&mut loader, &material, "", &scene, "a.glb");
        assert_eq!(textures.len(), 1);
        assert_eq!(textures[0].key, "a.glb*1");
        assert_eq!(textures[0].role, TextureRole::Diffuse);
        assert_eq!(device.texture_uploads(), 1);
        cache.release_all(&mut device);
    }

    #[test]
    fn diffuse_is_the_fallback_and_failures_are_skipped() {
        let mut device = RecordingDevice::new();
        let mut cache = TextureCache::new();
        let scene = ParsedScene {
            embedded_textures: vec![raw(1, 1)],
            ..Default::default()
        };
        let material = ParsedMaterial::new("m")
            .with_texture(TextureSlot::Diffuse, "*3")
            .with_texture(TextureSlot::Diffuse, "*0");

        let mut loader = TextureLoader::new(&mut device, &mut cache);
        let textures = resolve_material(&mut loader, &material, "", &scene, "a.obj");
        assert_eq!(textures.len(), 1);
        assert_eq!(textures[0].key, "a.obj*0");
        cache.release_all(&mut device);
    }

    #[test]
    fn materials_without_textures_resolve_to_nothing() {
        let mut device = RecordingDevice::new();
        let mut cache = TextureCache::new();
        let mut loader = TextureLoader::new(&mut device, &mut cache);
        let textures = resolve_material(
            &mut loader,
            &ParsedMaterial::new("plain"),
            "",
            &ParsedScene::default(),
            "a.obj",
        );
        assert!(textures.is_empty());
        assert_eq!(device.texture_uploads(), 0);
    }
}
